//! Line-folding output.
//!
//! Every physical line is at most 72 bytes. Longer header lines continue on
//! following lines that start with a single space.

use std::io::{self, Write};

/// Maximum bytes on one physical line, excluding the line terminator.
pub const LINE_WIDTH: usize = 72;

const NEWLINE: &[u8] = b"\r\n";

/// Write `line` folded to [`LINE_WIDTH`], followed by `\r\n`.
///
/// Folding works on bytes and may split a multi-byte UTF-8 character; the
/// reader joins continuation bytes before decoding.
pub fn write_folded<W: Write>(out: &mut W, line: &[u8]) -> io::Result<()> {
    let first = line.len().min(LINE_WIDTH);
    out.write_all(&line[..first])?;
    for chunk in line[first..].chunks(LINE_WIDTH - 1) {
        out.write_all(NEWLINE)?;
        out.write_all(b" ")?;
        out.write_all(chunk)?;
    }
    out.write_all(NEWLINE)
}

/// Write a `name: value` header line.
pub fn write_header<W: Write>(out: &mut W, name: &str, value: &str) -> io::Result<()> {
    let mut line = Vec::with_capacity(name.len() + 2 + value.len());
    line.extend_from_slice(name.as_bytes());
    line.extend_from_slice(b": ");
    line.extend_from_slice(value.as_bytes());
    write_folded(out, &line)
}

/// Write the blank line that closes a section.
pub fn write_blank<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(NEWLINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physical_lines(bytes: &[u8]) -> Vec<&[u8]> {
        bytes
            .split(|&b| b == b'\n')
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_short_line_is_not_folded() {
        let mut out = Vec::new();
        write_header(&mut out, "Main-Class", "com.example.App").unwrap();
        assert_eq!(out, b"Main-Class: com.example.App\r\n");
    }

    #[test]
    fn test_exactly_72_bytes_fits_one_line() {
        let mut out = Vec::new();
        write_folded(&mut out, &[b'x'; 72]).unwrap();
        assert_eq!(physical_lines(&out).len(), 1);
    }

    #[test]
    fn test_folded_lines_stay_within_width() {
        let mut out = Vec::new();
        write_folded(&mut out, &[b'y'; 200]).unwrap();
        let lines = physical_lines(&out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 72);
        assert_eq!(lines[1].len(), 72);
        assert!(lines[1].starts_with(b" "));
        assert_eq!(lines[2], [&b" "[..], &[b'y'; 57][..]].concat());
        for line in lines {
            assert!(line.len() <= LINE_WIDTH);
        }
    }

    #[test]
    fn test_blank() {
        let mut out = Vec::new();
        write_blank(&mut out).unwrap();
        assert_eq!(out, b"\r\n");
    }
}
