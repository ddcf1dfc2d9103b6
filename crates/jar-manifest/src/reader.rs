//! Buffered physical-line reader.
//!
//! Lines end in `\n`, `\r` or `\r\n`. The terminator is kept in the returned
//! bytes so callers can tell a complete line from one cut off by the length
//! limit or by end of input.

use std::io::{self, ErrorKind, Read};

/// Maximum length of one physical line, terminator included.
pub const MAX_LINE_LENGTH: usize = 512;

const BUFFER_SIZE: usize = 8192;

/// Line reader with one byte of lookahead.
pub struct LineReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    /// Refill the buffer when it is drained. Returns false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        if self.pos < self.filled {
            return Ok(true);
        }
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Next byte without consuming it.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.pos]))
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Read one physical line into `line`, replacing its contents.
    ///
    /// At most `limit` bytes are read. Returns the number of bytes read,
    /// 0 at end of input.
    pub fn read_line(&mut self, line: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
        line.clear();
        while line.len() < limit {
            let Some(byte) = self.next_byte()? else {
                break;
            };
            line.push(byte);
            if byte == b'\n' {
                break;
            }
            if byte == b'\r' {
                if line.len() < limit && self.peek()? == Some(b'\n') {
                    self.pos += 1;
                    line.push(b'\n');
                }
                break;
            }
        }
        Ok(line.len())
    }
}

/// Strip the line terminator, or return `None` if the line has none.
pub(crate) fn strip_terminator(line: &[u8]) -> Option<&[u8]> {
    match line {
        [rest @ .., b'\r', b'\n'] => Some(rest),
        [rest @ .., b'\n'] | [rest @ .., b'\r'] => Some(rest),
        _ => None,
    }
}
