//! Archive signing
//!
//! [`JarSigner`] adds per-entry digests to the manifest, derives the
//! signature file from the manifest bytes and signs it with Ed25519:
//! - `META-INF/MANIFEST.MF`: one `<ALG>-Digest` per entry
//! - `META-INF/<ALIAS>.SF`: digests of the manifest and its sections
//! - `META-INF/<ALIAS>.EC`: the JSON signature block
//!
//! Signature files of other signers are left in place.

use ed25519_dalek::SigningKey;
use jar_manifest::{AttributeName, Manifest, ManifestError, MANIFEST_NAME};
use std::io;
use thiserror::Error;

use crate::archive::{ArchiveSource, DirectoryArchive, MemoryArchive};
use crate::digest::{encode_digest, DigestAlgorithm};
use crate::signature::{
    is_block_or_sf, is_top_level_meta_inf, SignatureBlock, SignatureFileBuilder, BLOCK_EXTENSION,
    META_INF, SIGNATURE_FILE_EXTENSION,
};

/// Longest base name written for signature files
pub const MAX_BASE_NAME_LENGTH: usize = 8;

/// Errors from signing operations
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("existing manifest is invalid: {0}")]
    Manifest(#[from] ManifestError),

    #[error("invalid signer alias: {0:?}")]
    InvalidAlias(String),
}

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Files produced by one signing run
#[derive(Debug, Clone)]
pub struct SignedFiles {
    pub manifest: Vec<u8>,
    pub signature_file_name: String,
    pub signature_file: Vec<u8>,
    pub block_name: String,
    pub block: Vec<u8>,
    /// Entries that received a digest
    pub digested: usize,
}

/// Signs archives with one Ed25519 key
pub struct JarSigner {
    alias: String,
    base: String,
    key: SigningKey,
    algorithm: DigestAlgorithm,
    created_by: String,
    embed_signature_file: bool,
}

/// Signature file base name for an alias: upper case, at most eight
/// characters, anything outside `[A-Z0-9_-]` replaced by `_`.
pub fn signature_base_name(alias: &str) -> SigningResult<String> {
    let base: String = alias
        .chars()
        .take(MAX_BASE_NAME_LENGTH)
        .map(|c| match c.to_ascii_uppercase() {
            c @ ('A'..='Z' | '0'..='9' | '_' | '-') => c,
            _ => '_',
        })
        .collect();
    if base.is_empty() {
        return Err(SigningError::InvalidAlias(alias.to_string()));
    }
    Ok(base)
}

impl JarSigner {
    pub fn new(alias: &str, key: SigningKey) -> SigningResult<Self> {
        Ok(Self {
            alias: alias.to_string(),
            base: signature_base_name(alias)?,
            key,
            algorithm: DigestAlgorithm::Sha256,
            created_by: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            embed_signature_file: false,
        })
    }

    pub fn with_digest(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Also embed the signature file in the block
    pub fn embed_signature_file(mut self, embed: bool) -> Self {
        self.embed_signature_file = embed;
        self
    }

    pub fn signature_file_name(&self) -> String {
        format!("{}{}{}", META_INF, self.base, SIGNATURE_FILE_EXTENSION)
    }

    pub fn block_name(&self) -> String {
        format!("{}{}{}", META_INF, self.base, BLOCK_EXTENSION)
    }

    /// Compute the manifest, signature file and block for `archive`
    /// without modifying it.
    pub fn sign<A: ArchiveSource>(&self, archive: &A) -> SigningResult<SignedFiles> {
        let mut manifest = match archive.metadata(MANIFEST_NAME) {
            Some(_) => Manifest::from_bytes(&archive.read_bytes(MANIFEST_NAME)?)?,
            None => Manifest::new(),
        };
        let main = manifest.main_attributes_mut();
        if !main.contains_key(&AttributeName::MANIFEST_VERSION) {
            main.insert(AttributeName::MANIFEST_VERSION, "1.0");
        }
        if !main.contains_key(&AttributeName::CREATED_BY) {
            main.insert(AttributeName::CREATED_BY, self.created_by.as_str());
        }

        let mut digested = 0;
        for name in archive.names() {
            let Some(metadata) = archive.metadata(&name) else {
                continue;
            };
            if metadata.is_directory || is_signature_related(&name) {
                continue;
            }
            let digest = self.algorithm.digest(&archive.read_bytes(&name)?);
            manifest
                .attributes_mut(&name)
                .insert(self.algorithm.digest_attribute(), encode_digest(&digest));
            digested += 1;
        }

        let manifest_bytes = manifest.to_bytes();
        let signature_file = SignatureFileBuilder::new(self.algorithm)
            .created_by(self.created_by.as_str())
            .build_bytes(&manifest_bytes);
        let block = SignatureBlock::sign(
            &self.alias,
            &self.key,
            &signature_file,
            self.embed_signature_file,
        )
        .to_bytes()?;

        log::debug!(
            "signed {} entries of {} as {}",
            digested,
            archive.archive_name(),
            self.alias
        );
        Ok(SignedFiles {
            manifest: manifest_bytes,
            signature_file_name: self.signature_file_name(),
            signature_file,
            block_name: self.block_name(),
            block,
            digested,
        })
    }

    /// Sign an in-memory archive, placing the manifest and signature files
    /// at the front where verifiers expect them.
    pub fn sign_memory(&self, archive: &mut MemoryArchive) -> SigningResult<SignedFiles> {
        let files = self.sign(archive)?;
        let mut at = 0;
        if archive.get(META_INF).is_some() {
            archive.insert_file_at(0, META_INF, Vec::new());
            at = 1;
        }
        for (name, bytes) in [
            (MANIFEST_NAME.to_string(), &files.manifest),
            (files.signature_file_name.clone(), &files.signature_file),
            (files.block_name.clone(), &files.block),
        ] {
            archive.insert_file_at(at, name, bytes.clone());
            at += 1;
        }
        Ok(files)
    }

    /// Sign an exploded archive in place.
    pub fn sign_directory(&self, archive: &mut DirectoryArchive) -> SigningResult<SignedFiles> {
        let files = self.sign(archive)?;
        archive.write_entry(MANIFEST_NAME, &files.manifest)?;
        archive.write_entry(&files.signature_file_name, &files.signature_file)?;
        archive.write_entry(&files.block_name, &files.block)?;
        Ok(files)
    }
}

/// Manifest and signature files are never digested themselves.
fn is_signature_related(name: &str) -> bool {
    is_top_level_meta_inf(name) && (name.eq_ignore_ascii_case(MANIFEST_NAME) || is_block_or_sf(name))
}
