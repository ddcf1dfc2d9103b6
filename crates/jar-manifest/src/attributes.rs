//! Ordered attribute maps.

use std::io::{self, Read, Write};

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{FormatErrorKind, ManifestError};
use crate::name::{AttributeName, InvalidAttributeName};
use crate::parser::{ParseContext, ParseWarning};
use crate::reader::{strip_terminator, LineReader, MAX_LINE_LENGTH};
use crate::writer::{write_blank, write_header};

/// Attributes of one manifest section, in insertion order.
///
/// Keys compare without regard to ASCII case. Re-inserting an existing key
/// replaces the value but keeps the original position and spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    map: IndexMap<AttributeName, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: IndexMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, name: &AttributeName) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Look up by a plain string. Strings that are not valid names match nothing.
    pub fn get_value(&self, name: &str) -> Option<&str> {
        let name = AttributeName::new(name).ok()?;
        self.get(&name)
    }

    pub fn insert(&mut self, name: AttributeName, value: impl Into<String>) -> Option<String> {
        self.map.insert(name, value.into())
    }

    /// Insert under a name given as a string, validating it first.
    pub fn put_value(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<Option<String>, InvalidAttributeName> {
        let name = AttributeName::new(name)?;
        Ok(self.insert(name, value))
    }

    pub fn remove(&mut self, name: &AttributeName) -> Option<String> {
        self.map.shift_remove(name)
    }

    pub fn contains_key(&self, name: &AttributeName) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeName, &str)> {
        self.map.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &AttributeName> {
        self.map.keys()
    }

    /// Boolean attribute: `true` or `false` in any case.
    pub fn get_bool(&self, name: &AttributeName) -> Option<bool> {
        let value = self.get(name)?.trim();
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    /// Whitespace-separated list attribute such as `Class-Path`.
    pub fn get_list(&self, name: &AttributeName) -> Vec<&str> {
        self.get(name)
            .map(|v| v.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Read `name: value` lines up to a blank line or end of input.
    pub(crate) fn read_section<R: Read>(
        &mut self,
        reader: &mut LineReader<R>,
        ctx: &mut ParseContext,
    ) -> Result<(), ManifestError> {
        let mut line = Vec::with_capacity(MAX_LINE_LENGTH);
        let mut pending: Option<(AttributeName, Vec<u8>)> = None;

        loop {
            if reader.read_line(&mut line, MAX_LINE_LENGTH)? == 0 {
                break;
            }
            ctx.line += 1;
            let content =
                strip_terminator(&line).ok_or_else(|| ctx.error(FormatErrorKind::LineTooLong))?;
            if content.is_empty() {
                break;
            }

            if let Some(rest) = content.strip_prefix(b" ") {
                let Some((_, value)) = pending.as_mut() else {
                    return Err(ctx.error(FormatErrorKind::MisplacedContinuation));
                };
                value.extend_from_slice(rest);
            } else {
                let (name, value) = split_header(content)
                    .ok_or_else(|| ctx.error(FormatErrorKind::InvalidHeaderField))?;
                let name = AttributeName::new(&String::from_utf8_lossy(name))
                    .map_err(|e| ctx.error(FormatErrorKind::InvalidName(e)))?;
                pending = Some((name, value.to_vec()));
            }

            if reader.peek()? != Some(b' ') {
                if let Some((name, value)) = pending.take() {
                    self.store(name, value, ctx);
                }
            }
        }
        Ok(())
    }

    fn store(&mut self, name: AttributeName, value: Vec<u8>, ctx: &mut ParseContext) {
        let value = String::from_utf8_lossy(&value).into_owned();
        let (index, previous) = self.map.insert_full(name, value);
        if previous.is_some() {
            let label = self
                .map
                .get_index(index)
                .map(|(k, _)| k.to_string())
                .unwrap_or_default();
            let position = ctx.position();
            log::warn!("duplicate attribute '{label}' in manifest ({position})");
            ctx.warnings.push(ParseWarning::DuplicateName {
                name: label,
                section: ctx.section.clone(),
                position,
            });
        }
    }

    /// Write as a main section: the version attribute first, then the rest,
    /// then the closing blank line.
    ///
    /// `Manifest-Version` wins over `Signature-Version` when both exist; the
    /// loser is written in its normal position.
    pub fn write_main<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let version = [AttributeName::MANIFEST_VERSION, AttributeName::SIGNATURE_VERSION]
            .into_iter()
            .find_map(|n| self.map.get_key_value(&n));
        if let Some((name, value)) = version {
            write_header(out, name.as_str(), value)?;
        }
        for (name, value) in &self.map {
            if version.is_some_and(|(v, _)| v == name) {
                continue;
            }
            write_header(out, name.as_str(), value)?;
        }
        write_blank(out)
    }

    /// Write the attributes of an entry section followed by a blank line.
    /// The caller writes the `Name:` header.
    pub fn write_section<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (name, value) in &self.map {
            write_header(out, name.as_str(), value)?;
        }
        write_blank(out)
    }
}

/// Split `name: value`. The separator is a colon followed by exactly one space.
fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    if line.get(colon + 1) != Some(&b' ') {
        return None;
    }
    Some((&line[..colon], &line[colon + 2..]))
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a AttributeName, &'a String);
    type IntoIter = indexmap::map::Iter<'a, AttributeName, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl Extend<(AttributeName, String)> for Attributes {
    fn extend<T: IntoIterator<Item = (AttributeName, String)>>(&mut self, iter: T) {
        self.map.extend(iter);
    }
}

impl FromIterator<(AttributeName, String)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (AttributeName, String)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.map.len()))?;
        for (name, value) in &self.map {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &[u8]) -> Result<(Attributes, ParseContext), ManifestError> {
        let mut reader = LineReader::new(input);
        let mut ctx = ParseContext::new(None);
        let mut attrs = Attributes::new();
        attrs.read_section(&mut reader, &mut ctx)?;
        Ok((attrs, ctx))
    }

    fn name(s: &str) -> AttributeName {
        AttributeName::new(s).unwrap()
    }

    #[test]
    fn test_read_simple_section() {
        let (attrs, ctx) = read(b"Manifest-Version: 1.0\r\nMain-Class: a.B\r\n\r\n").unwrap();
        assert_eq!(attrs.get(&AttributeName::MANIFEST_VERSION), Some("1.0"));
        assert_eq!(attrs.get_value("main-class"), Some("a.B"));
        assert_eq!(ctx.line, 3);
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_continuation_joins_value() {
        let (attrs, _) = read(b"Class-Path: a.jar\n  b.jar\n c.jar\n\n").unwrap();
        assert_eq!(attrs.get(&AttributeName::CLASS_PATH), Some("a.jar b.jarc.jar"));
    }

    #[test]
    fn test_continuation_across_split_utf8() {
        // "é" is 0xC3 0xA9; split it across two physical lines.
        let (attrs, _) = read(b"Title: caf\xC3\n \xA9\n\n").unwrap();
        assert_eq!(attrs.get_value("Title"), Some("café"));
    }

    #[test]
    fn test_misplaced_continuation() {
        let err = read(b" orphan\n\n").unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatErrorKind::MisplacedContinuation));
        assert_eq!(err.position().map(|p| p.line), Some(1));
    }

    #[test]
    fn test_missing_space_after_colon() {
        let err = read(b"Main-Class:a.B\n\n").unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatErrorKind::InvalidHeaderField));
    }

    #[test]
    fn test_no_colon() {
        let err = read(b"Main-Class a.B\n\n").unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatErrorKind::InvalidHeaderField));
    }

    #[test]
    fn test_invalid_name_is_format_error() {
        let err = read(b"Bad.Name: x\n\n").unwrap_err();
        assert!(matches!(
            err.format_kind(),
            Some(FormatErrorKind::InvalidName(InvalidAttributeName::InvalidCharacter { .. }))
        ));
    }

    #[test]
    fn test_line_too_long() {
        let mut input = b"Key: ".to_vec();
        input.extend(std::iter::repeat(b'v').take(MAX_LINE_LENGTH));
        input.extend_from_slice(b"\n\n");
        let err = read(&input).unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatErrorKind::LineTooLong));
    }

    #[test]
    fn test_unterminated_last_line() {
        let err = read(b"Key: value").unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatErrorKind::LineTooLong));
    }

    #[test]
    fn test_duplicate_last_wins_with_one_warning() {
        let (attrs, ctx) = read(b"Key: first\nkey: second\n\n").unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get_value("KEY"), Some("second"));
        // Original spelling and position are kept.
        assert_eq!(attrs.names().next().map(|n| n.as_str()), Some("Key"));
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_typed_getters() {
        let mut attrs = Attributes::new();
        attrs.insert(AttributeName::MULTI_RELEASE, "TRUE");
        attrs.insert(AttributeName::SEALED, "maybe");
        attrs.insert(AttributeName::CLASS_PATH, " lib/a.jar   lib/b.jar ");
        assert_eq!(attrs.get_bool(&AttributeName::MULTI_RELEASE), Some(true));
        assert_eq!(attrs.get_bool(&AttributeName::SEALED), None);
        assert_eq!(attrs.get_list(&AttributeName::CLASS_PATH), vec!["lib/a.jar", "lib/b.jar"]);
        assert!(attrs.get_list(&AttributeName::EXTENSION_LIST).is_empty());
    }

    #[test]
    fn test_put_value_rejects_bad_name() {
        let mut attrs = Attributes::new();
        assert!(attrs.put_value("no spaces", "x").is_err());
        assert_eq!(attrs.put_value("Fine", "x").unwrap(), None);
        assert_eq!(attrs.put_value("FINE", "y").unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_write_main_puts_version_first() {
        let mut attrs = Attributes::new();
        attrs.insert(name("Created-By"), "tests");
        attrs.insert(AttributeName::MANIFEST_VERSION, "1.0");
        let mut out = Vec::new();
        attrs.write_main(&mut out).unwrap();
        assert_eq!(out, b"Manifest-Version: 1.0\r\nCreated-By: tests\r\n\r\n");
    }

    #[test]
    fn test_write_main_without_version_keeps_attributes() {
        let mut attrs = Attributes::new();
        attrs.insert(name("Created-By"), "tests");
        let mut out = Vec::new();
        attrs.write_main(&mut out).unwrap();
        assert_eq!(out, b"Created-By: tests\r\n\r\n");
    }

    #[test]
    fn test_write_main_signature_version() {
        let mut attrs = Attributes::new();
        attrs.insert(AttributeName::SHA_256_DIGEST_MANIFEST, "abc=");
        attrs.insert(AttributeName::SIGNATURE_VERSION, "1.0");
        let mut out = Vec::new();
        attrs.write_main(&mut out).unwrap();
        assert!(out.starts_with(b"Signature-Version: 1.0\r\n"));
    }

    #[test]
    fn test_serialize_preserves_order() {
        let mut attrs = Attributes::new();
        attrs.insert(name("Zeta"), "1");
        attrs.insert(name("Alpha"), "2");
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"Zeta":"1","Alpha":"2"}"#);
    }
}
