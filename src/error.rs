//! Error types for signature verification and archive access
//!
//! Three families with different handling:
//! - [`TrustViolation`]: a security failure, always surfaced to the caller.
//! - [`SignatureError`]: a problem with one signature block; absorbed and
//!   recorded, the block then contributes no signers.
//! - [`JarError`]: everything the archive handle can return.

use std::io;

use jar_manifest::{ManifestError, UntrustedEntry};
use thiserror::Error;

use crate::config::ConfigError;

/// A signed archive failed an integrity or trust check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustViolation {
    /// Entry bytes do not hash to the digest the manifest declares
    #[error("{algorithm} digest error for {name}")]
    DigestMismatch { name: String, algorithm: String },

    /// A signed entry's manifest section has no usable digest
    #[error("digest missing for {name}")]
    DigestMissing { name: String },

    /// The manifest section is not covered by every signer of the manifest
    #[error("untrusted manifest entry: {name}")]
    UntrustedManifestEntry { name: String },

    /// The entry was already verified with a different signer set
    #[error("conflicting signers for {name}")]
    ConflictingSigners { name: String },

    /// The signature file's main-attributes digest does not match the manifest
    #[error("invalid signature file digest for manifest main attributes in {signature_file}")]
    InvalidMainAttributesDigest {
        signature_file: String,
        algorithm: String,
    },
}

impl TrustViolation {
    /// Recover a violation carried inside an I/O error returned by a
    /// verifying stream.
    pub fn from_io(err: &io::Error) -> Option<&TrustViolation> {
        err.get_ref()?.downcast_ref::<TrustViolation>()
    }
}

impl From<TrustViolation> for io::Error {
    fn from(violation: TrustViolation) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, violation)
    }
}

impl From<UntrustedEntry> for TrustViolation {
    fn from(err: UntrustedEntry) -> Self {
        TrustViolation::UntrustedManifestEntry { name: err.name }
    }
}

/// Why a signature block could not contribute signers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("malformed signature block: {0}")]
    MalformedBlock(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("signature does not match signature file for {0}")]
    InvalidSignature(String),

    #[error("signer key {fingerprint} is not trusted")]
    UntrustedSigner { fingerprint: String },

    #[error("{name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("no signature file found for block {0}")]
    MissingSignatureFile(String),

    #[error("unparsable signature file for {name}: {reason}")]
    UnparsableSignatureFile { name: String, reason: String },
}

impl From<base64::DecodeError> for SignatureError {
    fn from(err: base64::DecodeError) -> Self {
        SignatureError::Base64(err.to_string())
    }
}

/// Errors from the archive handle
#[derive(Debug, Error)]
pub enum JarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("security violation: {0}")]
    Trust(#[from] TrustViolation),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("entry not found: {0}")]
    EntryNotFound(String),
}

impl From<UntrustedEntry> for JarError {
    fn from(err: UntrustedEntry) -> Self {
        JarError::Trust(err.into())
    }
}

impl JarError {
    /// Split an I/O error from a verifying stream back into a trust
    /// violation when it carries one.
    pub fn from_stream_error(err: io::Error) -> Self {
        match TrustViolation::from_io(&err) {
            Some(violation) => JarError::Trust(violation.clone()),
            None => JarError::Io(err),
        }
    }

    /// The trust violation behind this error, if any.
    pub fn trust_violation(&self) -> Option<&TrustViolation> {
        match self {
            JarError::Trust(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type for archive operations
pub type JarResult<T> = Result<T, JarError>;
