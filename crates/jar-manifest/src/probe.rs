//! Fast scan of raw manifest bytes for attributes that change how an
//! archive is opened, without a full parse.

use serde::Serialize;

const CLASS_PATH: &[u8] = b"CLASS-PATH: ";
const MULTI_RELEASE: &[u8] = b"MULTI-RELEASE: TRUE";

/// Result of [`scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpecialAttributes {
    pub has_class_path: bool,
    pub multi_release: bool,
}

/// Look for `Class-Path: ` and `Multi-Release: true` in any letter case.
///
/// The multi-release value counts only in the main section, when it ends
/// the line and is not continued on the next one.
pub fn scan(raw: &[u8]) -> SpecialAttributes {
    let main = main_section(raw);
    SpecialAttributes {
        has_class_path: find_folded(raw, CLASS_PATH).is_some(),
        multi_release: find_folded(main, MULTI_RELEASE)
            .is_some_and(|at| value_ends_here(main, at + MULTI_RELEASE.len())),
    }
}

/// Bytes up to the first blank line, terminator of the last header included.
fn main_section(raw: &[u8]) -> &[u8] {
    let mut line_start = true;
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'\r' | b'\n' if line_start => return &raw[..i],
            b'\r' => {
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                line_start = true;
            }
            b'\n' => line_start = true,
            _ => line_start = false,
        }
        i += 1;
    }
    raw
}

/// Is `at` the end of an uncontinued header line?
fn value_ends_here(raw: &[u8], at: usize) -> bool {
    let rest = &raw[at..];
    let after = match rest {
        [b'\r', b'\n', after @ ..] | [b'\n', after @ ..] | [b'\r', after @ ..] => after,
        _ => return false,
    };
    after.first() != Some(&b' ')
}

/// Horspool search for an upper-case `pattern`, folding ASCII letters in
/// `haystack` to upper case.
fn find_folded(haystack: &[u8], pattern: &[u8]) -> Option<usize> {
    let n = pattern.len();
    if n == 0 || haystack.len() < n {
        return None;
    }
    let mut shift = [n; 256];
    for (i, &b) in pattern[..n - 1].iter().enumerate() {
        shift[b as usize] = n - 1 - i;
    }
    let mut at = 0;
    while at + n <= haystack.len() {
        let window = &haystack[at..at + n];
        if window
            .iter()
            .zip(pattern)
            .all(|(h, p)| h.to_ascii_uppercase() == *p)
        {
            return Some(at);
        }
        at += shift[haystack[at + n - 1].to_ascii_uppercase() as usize];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_folded() {
        assert_eq!(find_folded(b"xx class-path: a", CLASS_PATH), Some(3));
        assert_eq!(find_folded(b"Class-Path:a", CLASS_PATH), None);
        assert_eq!(find_folded(b"", CLASS_PATH), None);
    }

    #[test]
    fn test_scan_class_path() {
        let raw = b"Manifest-Version: 1.0\r\nClass-Path: lib/a.jar\r\n\r\n";
        let found = scan(raw);
        assert!(found.has_class_path);
        assert!(!found.multi_release);
    }

    #[test]
    fn test_scan_multi_release_terminators() {
        for raw in [
            &b"Multi-Release: true\r\n\r\n"[..],
            b"multi-release: TRUE\nName: x\n",
            b"Multi-Release: true\rX: y\r",
        ] {
            assert!(scan(raw).multi_release, "{:?}", String::from_utf8_lossy(raw));
        }
    }

    #[test]
    fn test_scan_multi_release_rejects_continued_or_longer_value() {
        assert!(!scan(b"Multi-Release: true\r\n false\r\n").multi_release);
        assert!(!scan(b"Multi-Release: trueish\r\n").multi_release);
        assert!(!scan(b"Multi-Release: false\r\n").multi_release);
        assert!(!scan(b"Multi-Release: true").multi_release);
    }

    #[test]
    fn test_main_section_bounds() {
        assert_eq!(main_section(b"A: 1\r\nB: 2\r\n\r\nName: x\r\n"), b"A: 1\r\nB: 2\r\n");
        assert_eq!(main_section(b"A: 1\n\nName: x\n"), b"A: 1\n");
        assert_eq!(main_section(b"A: 1\r\rName: x\r"), b"A: 1\r");
        assert_eq!(main_section(b"A: 1\r\n"), b"A: 1\r\n");
        assert_eq!(main_section(b"\r\nA: 1\r\n"), b"");
    }

    #[test]
    fn test_scan_ignores_multi_release_in_entry_section() {
        let raw = b"Manifest-Version: 1.0\r\n\r\nName: a\r\nMulti-Release: true\r\n\r\n";
        assert!(!scan(raw).multi_release);

        let raw = b"Manifest-Version: 1.0\r\nMulti-Release: true\r\n\r\nName: a\r\nX: y\r\n\r\n";
        assert!(scan(raw).multi_release);
    }
}
