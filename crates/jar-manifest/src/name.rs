//! Attribute names.
//!
//! A name is a token of 1 to 70 characters drawn from `[0-9A-Za-z_-]`.
//! Equality and hashing both ignore ASCII case, so `Class-Path` and
//! `CLASS-PATH` address the same attribute while each keeps the spelling it
//! was created with.
//!
//! A fixed set of well-known names is interned once per process. Looking one
//! of them up by its exact spelling returns the shared value without
//! allocating or hashing.

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Longest permitted attribute name, in characters.
pub const MAX_NAME_LENGTH: usize = 70;

/// Reasons a string cannot be used as an attribute name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAttributeName {
    #[error("attribute name is empty")]
    Empty,

    #[error("attribute name '{name}' is {length} characters long (maximum 70)")]
    TooLong { name: String, length: usize },

    #[error("attribute name '{name}' contains invalid character {character:?}")]
    InvalidCharacter { name: String, character: char },
}

/// A case-insensitive manifest attribute name.
#[derive(Clone)]
pub struct AttributeName {
    name: Cow<'static, str>,
    hash: u32,
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Hash over the name with ASCII letters folded to upper case.
const fn folded_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        hash = hash
            .wrapping_mul(31)
            .wrapping_add(bytes[i].to_ascii_uppercase() as u32);
        i += 1;
    }
    hash
}

fn validate(name: &str) -> Result<(), InvalidAttributeName> {
    if name.is_empty() {
        return Err(InvalidAttributeName::Empty);
    }
    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(InvalidAttributeName::TooLong {
            name: name.to_string(),
            length,
        });
    }
    if let Some(character) = name.chars().find(|c| !c.is_ascii() || !is_name_byte(*c as u8)) {
        return Err(InvalidAttributeName::InvalidCharacter {
            name: name.to_string(),
            character,
        });
    }
    Ok(())
}

impl AttributeName {
    /// Build a name from a static string at compile time.
    ///
    /// Panics (during constant evaluation) if the string is not a valid name.
    pub const fn from_static(name: &'static str) -> Self {
        let bytes = name.as_bytes();
        assert!(!bytes.is_empty() && bytes.len() <= MAX_NAME_LENGTH);
        let mut i = 0;
        while i < bytes.len() {
            assert!(is_name_byte(bytes[i]));
            i += 1;
        }
        Self {
            name: Cow::Borrowed(name),
            hash: folded_hash(bytes),
        }
    }

    /// Validate `name` and return the corresponding attribute name.
    ///
    /// Well-known names spelled exactly as registered come straight from the
    /// process-wide registry.
    pub fn new(name: &str) -> Result<Self, InvalidAttributeName> {
        if let Some(known) = WELL_KNOWN.get(name) {
            return Ok(known.clone());
        }
        validate(name)?;
        Ok(Self {
            hash: folded_hash(name.as_bytes()),
            name: Cow::Owned(name.to_string()),
        })
    }

    /// The name as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The case-folded hash shared by every spelling of this name.
    pub fn folded_hash(&self) -> u32 {
        self.hash
    }

    /// Whether this value came from the well-known registry.
    pub fn is_interned(&self) -> bool {
        matches!(self.name, Cow::Borrowed(_))
    }

    /// Case-insensitive comparison against a plain string.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// If the name ends with `suffix` (ignoring case), return the part before it.
    ///
    /// `SHA-256-Digest` with suffix `-Digest` yields `SHA-256`.
    pub fn strip_suffix_ignore_case(&self, suffix: &str) -> Option<&str> {
        let name = self.as_str();
        if name.len() < suffix.len() {
            return None;
        }
        let split = name.len() - suffix.len();
        if !name.is_char_boundary(split) {
            return None;
        }
        let (head, tail) = name.split_at(split);
        tail.eq_ignore_ascii_case(suffix).then_some(head)
    }
}

impl PartialEq for AttributeName {
    fn eq(&self, other: &Self) -> bool {
        // The folded hash is lossy, so equal hashes still need the string check.
        self.hash == other.hash && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for AttributeName {}

impl Hash for AttributeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeName").field(&self.as_str()).finish()
    }
}

impl FromStr for AttributeName {
    type Err = InvalidAttributeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for AttributeName {
    type Error = InvalidAttributeName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for AttributeName {
    type Error = InvalidAttributeName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(known) = WELL_KNOWN.get(value.as_str()) {
            return Ok(known.clone());
        }
        validate(&value)?;
        Ok(Self {
            hash: folded_hash(value.as_bytes()),
            name: Cow::Owned(value),
        })
    }
}

impl Serialize for AttributeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

macro_rules! well_known_names {
    ($($(#[$doc:meta])* $ident:ident => $text:literal,)*) => {
        impl AttributeName {
            $(
                $(#[$doc])*
                pub const $ident: AttributeName = AttributeName::from_static($text);
            )*
        }

        const WELL_KNOWN_NAMES: &[&str] = &[$($text),*];
    };
}

well_known_names! {
    /// `Manifest-Version`, written first in a manifest's main section.
    MANIFEST_VERSION => "Manifest-Version",
    /// `Signature-Version`, written first in a signature file's main section.
    SIGNATURE_VERSION => "Signature-Version",
    CONTENT_TYPE => "Content-Type",
    CLASS_PATH => "Class-Path",
    MAIN_CLASS => "Main-Class",
    SEALED => "Sealed",
    EXTENSION_LIST => "Extension-List",
    EXTENSION_NAME => "Extension-Name",
    IMPLEMENTATION_TITLE => "Implementation-Title",
    IMPLEMENTATION_VERSION => "Implementation-Version",
    IMPLEMENTATION_VENDOR => "Implementation-Vendor",
    SPECIFICATION_TITLE => "Specification-Title",
    SPECIFICATION_VERSION => "Specification-Version",
    SPECIFICATION_VENDOR => "Specification-Vendor",
    /// `Multi-Release`, enables versioned entries under `META-INF/versions/`.
    MULTI_RELEASE => "Multi-Release",
    LAUNCHER_AGENT_CLASS => "Launcher-Agent-Class",
    AUTOMATIC_MODULE_NAME => "Automatic-Module-Name",
    CREATED_BY => "Created-By",
    /// Section header of every per-entry section.
    NAME => "Name",
    SHA1_DIGEST => "SHA1-Digest",
    SHA_1_DIGEST => "SHA-1-Digest",
    SHA_256_DIGEST => "SHA-256-Digest",
    SHA_384_DIGEST => "SHA-384-Digest",
    SHA_512_DIGEST => "SHA-512-Digest",
    SHA1_DIGEST_MANIFEST => "SHA1-Digest-Manifest",
    SHA_256_DIGEST_MANIFEST => "SHA-256-Digest-Manifest",
    SHA_384_DIGEST_MANIFEST => "SHA-384-Digest-Manifest",
    SHA_512_DIGEST_MANIFEST => "SHA-512-Digest-Manifest",
    SHA1_DIGEST_MANIFEST_MAIN_ATTRIBUTES => "SHA1-Digest-Manifest-Main-Attributes",
    SHA_256_DIGEST_MANIFEST_MAIN_ATTRIBUTES => "SHA-256-Digest-Manifest-Main-Attributes",
    SHA_384_DIGEST_MANIFEST_MAIN_ATTRIBUTES => "SHA-384-Digest-Manifest-Main-Attributes",
    SHA_512_DIGEST_MANIFEST_MAIN_ATTRIBUTES => "SHA-512-Digest-Manifest-Main-Attributes",
}

/// Interned well-known names keyed by their exact spelling. Built once,
/// never mutated afterwards.
static WELL_KNOWN: Lazy<HashMap<&'static str, AttributeName>> = Lazy::new(|| {
    WELL_KNOWN_NAMES
        .iter()
        .map(|&text| (text, AttributeName::from_static(text)))
        .collect()
});
