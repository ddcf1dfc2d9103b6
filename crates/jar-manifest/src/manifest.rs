//! The manifest document: main attributes plus per-entry sections.

use std::io::{self, Read, Write};

use indexmap::IndexMap;
use serde::Serialize;

use crate::attributes::Attributes;
use crate::error::ManifestError;
use crate::name::AttributeName;
use crate::parser::ManifestParser;
use crate::writer::write_folded;

/// Decides whether an entry's manifest section can be trusted.
///
/// A signature verifier implements this to tell callers when a section was
/// not covered by every signer of the manifest.
pub trait TrustPredicate {
    fn is_trusted_manifest_entry(&self, name: &str) -> bool;
}

/// An entry's section exists but is not covered by the manifest's signers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("untrusted manifest entry: {name}")]
pub struct UntrustedEntry {
    pub name: String,
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    #[serde(rename = "main_attributes")]
    main: Attributes,
    entries: IndexMap<String, Attributes>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest, discarding warnings. Use [`ManifestParser`] to keep them.
    pub fn read<R: Read>(input: R) -> Result<Self, ManifestError> {
        ManifestParser::new().parse(input)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        Self::read(bytes)
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    pub fn entries(&self) -> &IndexMap<String, Attributes> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut IndexMap<String, Attributes> {
        &mut self.entries
    }

    /// Section for `name`, if the manifest has one.
    pub fn attributes(&self, name: &str) -> Option<&Attributes> {
        self.entries.get(name)
    }

    /// Section for `name`, created empty if missing.
    pub fn attributes_mut(&mut self, name: &str) -> &mut Attributes {
        self.entries.entry(name.to_string()).or_default()
    }

    pub fn insert_entry(&mut self, name: impl Into<String>, attributes: Attributes) -> Option<Attributes> {
        self.entries.insert(name.into(), attributes)
    }

    pub fn remove_entry(&mut self, name: &str) -> Option<Attributes> {
        self.entries.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.main.clear();
        self.entries.clear();
    }

    /// Value of a main attribute by name.
    pub fn main_value(&self, name: &AttributeName) -> Option<&str> {
        self.main.get(name)
    }

    /// Section for `name`, provided `trust` vouches for it.
    ///
    /// Missing sections are `Ok(None)` without consulting `trust`.
    pub fn trusted_attributes(
        &self,
        name: &str,
        trust: &dyn TrustPredicate,
    ) -> Result<Option<&Attributes>, UntrustedEntry> {
        let Some(attributes) = self.entries.get(name) else {
            return Ok(None);
        };
        if trust.is_trusted_manifest_entry(name) {
            Ok(Some(attributes))
        } else {
            Err(UntrustedEntry {
                name: name.to_string(),
            })
        }
    }

    /// Write the canonical form: main section, then each entry as a
    /// `Name:` header, its attributes and a blank line.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.main.write_main(out)?;
        for (name, attributes) in &self.entries {
            let mut header = Vec::with_capacity(6 + name.len());
            header.extend_from_slice(b"Name: ");
            header.extend_from_slice(name.as_bytes());
            write_folded(out, &header)?;
            attributes.write_section(out)?;
        }
        out.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut out);
        out
    }

    /// A manifest carrying only `Manifest-Version: 1.0` and `Created-By`.
    pub fn with_version(created_by: &str) -> Self {
        let mut manifest = Self::new();
        manifest.main.insert(AttributeName::MANIFEST_VERSION, "1.0");
        manifest.main.insert(AttributeName::CREATED_BY, created_by);
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TrustOnly(&'static str);

    impl TrustPredicate for TrustOnly {
        fn is_trusted_manifest_entry(&self, name: &str) -> bool {
            name == self.0
        }
    }

    fn sample() -> Manifest {
        let mut manifest = Manifest::with_version("tests");
        manifest
            .attributes_mut("a/A.class")
            .insert(AttributeName::SHA_256_DIGEST, "aaa=");
        manifest
            .attributes_mut("b/B.class")
            .insert(AttributeName::SHA_256_DIGEST, "bbb=");
        manifest
    }

    #[test]
    fn test_write_layout() {
        let bytes = sample().to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "Manifest-Version: 1.0\r\nCreated-By: tests\r\n\r\n\
             Name: a/A.class\r\nSHA-256-Digest: aaa=\r\n\r\n\
             Name: b/B.class\r\nSHA-256-Digest: bbb=\r\n\r\n"
        );
    }

    #[test]
    fn test_read_back_equals() {
        let manifest = sample();
        let parsed = Manifest::from_bytes(&manifest.to_bytes()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_trusted_attributes() {
        let manifest = sample();
        let trust = TrustOnly("a/A.class");
        assert!(manifest.trusted_attributes("a/A.class", &trust).unwrap().is_some());
        assert_eq!(
            manifest.trusted_attributes("b/B.class", &trust).unwrap_err(),
            UntrustedEntry {
                name: "b/B.class".to_string()
            }
        );
        assert_eq!(manifest.trusted_attributes("missing", &trust), Ok(None));
    }

    #[test]
    fn test_remove_entry_keeps_order() {
        let mut manifest = sample();
        manifest.attributes_mut("c");
        manifest.remove_entry("a/A.class");
        let names: Vec<&str> = manifest.entries().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b/B.class", "c"]);
    }

    #[test]
    fn test_serialize_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["main_attributes"]["Manifest-Version"], "1.0");
        assert_eq!(json["entries"]["b/B.class"]["SHA-256-Digest"], "bbb=");
    }
}
