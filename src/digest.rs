//! Digest algorithms used in manifests and signature files
//!
//! Digest attributes are named `<ALG>-Digest`, `<ALG>-Digest-Manifest` and
//! `<ALG>-Digest-Manifest-Main-Attributes`. The algorithm part is matched
//! without regard to case or dashes, so `SHA-256`, `sha256` and `SHA256`
//! all select SHA-256. Unknown algorithms are ignored rather than rejected.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jar_manifest::AttributeName;
use serde::{Deserialize, Serialize};
use sha2::digest::DynDigest;
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha1::Sha1;
use std::fmt;
use std::str::FromStr;

/// A supported message digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

/// Upper-case a digest name and drop its dashes.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    /// Resolve an algorithm from the prefix of a digest attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "SHA" | "SHA1" => Some(DigestAlgorithm::Sha1),
            "SHA256" => Some(DigestAlgorithm::Sha256),
            "SHA384" => Some(DigestAlgorithm::Sha384),
            "SHA512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Standard display name
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// `<ALG>-Digest`, as written for per-entry digests
    pub fn digest_attribute(self) -> AttributeName {
        match self {
            DigestAlgorithm::Sha1 => AttributeName::SHA1_DIGEST,
            DigestAlgorithm::Sha256 => AttributeName::SHA_256_DIGEST,
            DigestAlgorithm::Sha384 => AttributeName::SHA_384_DIGEST,
            DigestAlgorithm::Sha512 => AttributeName::SHA_512_DIGEST,
        }
    }

    /// `<ALG>-Digest-Manifest`, the whole-manifest digest in a signature file
    pub fn manifest_attribute(self) -> AttributeName {
        match self {
            DigestAlgorithm::Sha1 => AttributeName::SHA1_DIGEST_MANIFEST,
            DigestAlgorithm::Sha256 => AttributeName::SHA_256_DIGEST_MANIFEST,
            DigestAlgorithm::Sha384 => AttributeName::SHA_384_DIGEST_MANIFEST,
            DigestAlgorithm::Sha512 => AttributeName::SHA_512_DIGEST_MANIFEST,
        }
    }

    /// `<ALG>-Digest-Manifest-Main-Attributes`
    pub fn main_attributes_attribute(self) -> AttributeName {
        match self {
            DigestAlgorithm::Sha1 => AttributeName::SHA1_DIGEST_MANIFEST_MAIN_ATTRIBUTES,
            DigestAlgorithm::Sha256 => AttributeName::SHA_256_DIGEST_MANIFEST_MAIN_ATTRIBUTES,
            DigestAlgorithm::Sha384 => AttributeName::SHA_384_DIGEST_MANIFEST_MAIN_ATTRIBUTES,
            DigestAlgorithm::Sha512 => AttributeName::SHA_512_DIGEST_MANIFEST_MAIN_ATTRIBUTES,
        }
    }

    /// A fresh incremental hasher
    pub fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            DigestAlgorithm::Sha1 => Box::new(Sha1::new()),
            DigestAlgorithm::Sha256 => Box::new(Sha256::new()),
            DigestAlgorithm::Sha384 => Box::new(Sha384::new()),
            DigestAlgorithm::Sha512 => Box::new(Sha512::new()),
        }
    }

    /// One-shot digest of `data`
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unsupported digest algorithm '{}'", s))
    }
}

/// Which digest algorithms may be used for verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPolicy {
    /// Normalized names that are never armed
    disabled: Vec<String>,
}

impl Default for DigestPolicy {
    fn default() -> Self {
        Self::new(["MD2", "MD5"])
    }
}

impl DigestPolicy {
    pub fn new<I, S>(disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            disabled: disabled.into_iter().map(|s| normalize(s.as_ref())).collect(),
        }
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        let name = normalize(name);
        self.disabled.iter().any(|d| *d == name)
    }

    /// Resolve an attribute prefix to an algorithm, unless it is unknown or
    /// disabled.
    pub fn resolve(&self, name: &str) -> Option<DigestAlgorithm> {
        let algorithm = DigestAlgorithm::from_name(name)?;
        if self.is_disabled(name) || self.is_disabled(algorithm.name()) {
            log::trace!("digest algorithm {} is disabled", name);
            return None;
        }
        Some(algorithm)
    }
}

/// Base64 for digest attribute values
pub fn encode_digest(digest: &[u8]) -> String {
    STANDARD.encode(digest)
}

/// Decode a digest attribute value, ignoring embedded whitespace.
///
/// Undecodable values yield an empty digest, which never matches.
pub fn decode_digest(value: &str) -> Vec<u8> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).unwrap_or_default()
}
