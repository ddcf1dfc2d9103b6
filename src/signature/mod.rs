//! Signature files, signature blocks and the manifest digester
//!
//! A signed archive carries, next to `META-INF/MANIFEST.MF`, one signature
//! file (`META-INF/<BASE>.SF`) per signer listing digests of manifest
//! sections, and a signature block (`META-INF/<BASE>.EC`, `.RSA` or `.DSA`)
//! holding the cryptographic signature over that signature file.

pub mod block;
pub mod digester;
pub mod file;

pub use block::{
    compute_key_fingerprint, decode_signing_key, decode_verifying_key, encode_signing_key,
    encode_verifying_key, generate_keypair, CodeSigner, SignatureBlock, SIGNATURE_ALGORITHM,
};
pub use digester::ManifestDigester;
pub use file::{BlockOutcome, BlockReport, SignatureFileBuilder, SignatureFileVerifier};

use std::sync::Arc;

/// Signers of one entry, shared between entries with identical sets
pub type Signers = Arc<[CodeSigner]>;

/// Directory holding manifest and signature files
pub const META_INF: &str = "META-INF/";

/// Extension of signature files
pub const SIGNATURE_FILE_EXTENSION: &str = ".SF";

/// Extension written for signature blocks
pub const BLOCK_EXTENSION: &str = ".EC";

/// Extensions accepted for signature blocks
pub const BLOCK_EXTENSIONS: [&str; 3] = [".EC", ".RSA", ".DSA"];

/// Kind of a signature-related file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFileKind {
    SignatureFile,
    Block,
}

/// Classify a name by its extension, ignoring case.
pub fn signature_file_kind(name: &str) -> Option<SignatureFileKind> {
    let upper = name.to_ascii_uppercase();
    if upper.ends_with(SIGNATURE_FILE_EXTENSION) {
        Some(SignatureFileKind::SignatureFile)
    } else if BLOCK_EXTENSIONS.iter().any(|ext| upper.ends_with(ext)) {
        Some(SignatureFileKind::Block)
    } else {
        None
    }
}

/// Whether `name` is a signature file or block.
pub fn is_block_or_sf(name: &str) -> bool {
    signature_file_kind(name).is_some()
}

/// Upper-cased path without extension, shared by a signature file and its
/// block: `META-INF/signer.sf` and `META-INF/SIGNER.EC` both give
/// `META-INF/SIGNER`.
pub fn base_name(name: &str) -> String {
    let name = name.strip_prefix('/').unwrap_or(name);
    let stem = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    stem.to_ascii_uppercase()
}

/// Whether `name` is a file directly inside `META-INF/` (not in a
/// subdirectory), ignoring case.
pub fn is_top_level_meta_inf(name: &str) -> bool {
    match name.get(..META_INF.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(META_INF) => {
            let rest = &name[META_INF.len()..];
            !rest.is_empty() && !rest.contains('/')
        }
        _ => false,
    }
}

/// Set equality of two signer lists.
pub fn same_signers(a: &[CodeSigner], b: &[CodeSigner]) -> bool {
    a.len() == b.len() && a.iter().all(|s| b.contains(s))
}

/// Strip a leading `./` and then a leading `/` from an entry name.
pub fn normalize_entry_name(name: &str) -> &str {
    let name = name.strip_prefix("./").unwrap_or(name);
    name.strip_prefix('/').unwrap_or(name)
}
