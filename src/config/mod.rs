//! Verifier configuration (jarverify.toml)
//!
//! Every key is optional. Values are validated after loading; CLI flags may
//! override individual fields afterwards.

mod defaults;

pub use defaults::{
    BASE_RELEASE, CONFIG_FILE_NAME, DEFAULT_DISABLED_DIGESTS, DEFAULT_MAX_SIGNATURE_FILE_SIZE,
    DEFAULT_RELEASE,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::digest::DigestPolicy;

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// How versioned entries are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiReleaseMode {
    /// Honour the manifest's `Multi-Release` attribute
    #[default]
    Auto,
    /// Never resolve versioned entries
    Disabled,
    /// Resolve versioned entries even without the attribute
    Forced,
}

/// Verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// When false the archive is always treated as unsigned
    #[serde(default = "defaults::verify")]
    pub verify: bool,

    /// Multi-release handling
    #[serde(default)]
    pub multi_release: MultiReleaseMode,

    /// Runtime feature version for versioned entry lookup (>= 8)
    #[serde(default = "defaults::release")]
    pub release: u32,

    /// Digest names that are never armed, e.g. "MD5"
    #[serde(default = "defaults::disabled_digest_algorithms")]
    pub disabled_digest_algorithms: Vec<String>,

    /// Signature files and blocks above this size are not processed
    #[serde(default = "defaults::max_signature_file_size")]
    pub max_signature_file_size: u64,

    /// Hex SHA-256 fingerprints of accepted signer keys.
    /// Empty accepts any key whose signature checks out.
    #[serde(default)]
    pub trusted_signers: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            verify: defaults::verify(),
            multi_release: MultiReleaseMode::default(),
            release: defaults::release(),
            disabled_digest_algorithms: defaults::disabled_digest_algorithms(),
            max_signature_file_size: defaults::max_signature_file_size(),
            trusted_signers: Vec::new(),
        }
    }
}

impl VerifierConfig {
    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Load `path` if it exists, otherwise return the defaults
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: VerifierConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.release < BASE_RELEASE {
            return Err(ConfigError::ValidationError(format!(
                "release must be at least {}, got {}",
                BASE_RELEASE, self.release
            )));
        }

        if self.max_signature_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_signature_file_size must be greater than zero".to_string(),
            ));
        }

        for fingerprint in &self.trusted_signers {
            let valid = fingerprint.len() == 64 && fingerprint.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "trusted signer '{}' is not a hex SHA-256 fingerprint",
                    fingerprint
                )));
            }
        }

        Ok(())
    }

    /// Digest policy derived from `disabled_digest_algorithms`
    pub fn digest_policy(&self) -> DigestPolicy {
        DigestPolicy::new(&self.disabled_digest_algorithms)
    }

    /// Trusted fingerprints, lower-cased for comparison
    pub fn trusted_fingerprints(&self) -> Vec<String> {
        self.trusted_signers
            .iter()
            .map(|f| f.to_ascii_lowercase())
            .collect()
    }
}
