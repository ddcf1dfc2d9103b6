//! Built-in defaults
//!
//! Values used when a key is absent from `jarverify.toml`.

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "jarverify.toml";

/// Runtime feature version used for multi-release lookup
pub const DEFAULT_RELEASE: u32 = 17;

/// Lowest accepted release; 8 predates versioned entries
pub const BASE_RELEASE: u32 = 8;

/// Digest algorithms that are never used for verification
pub const DEFAULT_DISABLED_DIGESTS: &[&str] = &["MD2", "MD5"];

/// Signature-related files larger than this are treated as unsigned
pub const DEFAULT_MAX_SIGNATURE_FILE_SIZE: u64 = 16_000_000;

pub(crate) fn verify() -> bool {
    true
}

pub(crate) fn release() -> u32 {
    DEFAULT_RELEASE
}

pub(crate) fn disabled_digest_algorithms() -> Vec<String> {
    DEFAULT_DISABLED_DIGESTS.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn max_signature_file_size() -> u64 {
    DEFAULT_MAX_SIGNATURE_FILE_SIZE
}
