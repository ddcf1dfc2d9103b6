//! Digests over raw manifest sections.
//!
//! Signature files sign the manifest's bytes exactly as stored, so sections
//! are located in the raw bytes rather than re-serialized from a parsed
//! [`Manifest`](jar_manifest::Manifest). A section spans from its first line
//! through the blank line that ends it.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::ops::Range;

use crate::digest::DigestAlgorithm;

const NAME_HEADER: &[u8] = b"Name: ";

/// Section index over raw manifest bytes
#[derive(Debug, Clone)]
pub struct ManifestDigester {
    raw: Vec<u8>,
    main: Range<usize>,
    /// Sections per entry name; repeated sections are digested together.
    entries: IndexMap<String, Vec<Range<usize>>>,
    whole: HashMap<DigestAlgorithm, Vec<u8>>,
}

/// Locate the section starting at `start`.
///
/// Returns the end of the section's last content line and the start of the
/// next section (just past the terminating blank line), or `None` at end
/// of input.
fn find_section(raw: &[u8], start: usize) -> Option<(usize, usize)> {
    if start >= raw.len() {
        return None;
    }
    let mut line_start = start;
    let mut i = start;
    while i < raw.len() {
        let byte = raw[i];
        if byte != b'\r' && byte != b'\n' {
            i += 1;
            continue;
        }
        let mut next = i + 1;
        if byte == b'\r' && raw.get(next) == Some(&b'\n') {
            next += 1;
        }
        if i == line_start {
            return Some((line_start, next));
        }
        line_start = next;
        i = next;
    }
    Some((raw.len(), raw.len()))
}

/// Split on `\r\n`, `\n` or `\r`, dropping the terminators.
fn lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = bytes;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(rest.len());
        let line = &rest[..end];
        let skip = match rest.get(end..) {
            Some([b'\r', b'\n', ..]) => end + 2,
            Some([b'\r' | b'\n', ..]) => end + 1,
            _ => end,
        };
        rest = &rest[skip..];
        Some(line)
    })
}

/// Entry name of a section: the `Name:` value joined with continuation lines.
fn section_name(section: &[u8]) -> Option<String> {
    let mut lines = lines(section);
    let first = lines.next()?;
    let label = first.get(..NAME_HEADER.len())?;
    if !label.eq_ignore_ascii_case(NAME_HEADER) {
        return None;
    }
    let mut name = first[NAME_HEADER.len()..].to_vec();
    for line in lines {
        match line.strip_prefix(b" ") {
            Some(rest) => name.extend_from_slice(rest),
            None => break,
        }
    }
    Some(String::from_utf8_lossy(&name).into_owned())
}

impl ManifestDigester {
    pub fn new(raw: Vec<u8>) -> Self {
        let main_end = find_section(&raw, 0).map_or(0, |(_, next)| next);
        let mut entries: IndexMap<String, Vec<Range<usize>>> = IndexMap::new();

        let mut pos = main_end;
        while let Some((end, next)) = find_section(&raw, pos) {
            if let Some(name) = section_name(&raw[pos..end]) {
                entries.entry(name).or_default().push(pos..next);
            }
            pos = next;
        }

        Self {
            raw,
            main: 0..main_end,
            entries,
            whole: HashMap::new(),
        }
    }

    /// Digest of the complete manifest, computed once per algorithm
    pub fn manifest_digest(&mut self, algorithm: DigestAlgorithm) -> &[u8] {
        let raw = &self.raw;
        self.whole
            .entry(algorithm)
            .or_insert_with(|| algorithm.digest(raw))
    }

    /// Digest of the main section including its blank line
    pub fn main_attributes_digest(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        algorithm.digest(&self.raw[self.main.clone()])
    }

    /// Digest of every section for `name`, or `None` without a section
    pub fn entry_digest(&self, name: &str, algorithm: DigestAlgorithm) -> Option<Vec<u8>> {
        let sections = self.entries.get(name)?;
        let mut hasher = algorithm.hasher();
        for range in sections {
            hasher.update(&self.raw[range.clone()]);
        }
        Some(hasher.finalize().into_vec())
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names in manifest order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Raw bytes of the first section for `name`
    pub fn entry_bytes(&self, name: &str) -> Option<&[u8]> {
        let range = self.entries.get(name)?.first()?;
        Some(&self.raw[range.clone()])
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}
