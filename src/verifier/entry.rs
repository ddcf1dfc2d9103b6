//! Per-entry digest accumulation.

use std::collections::HashMap;
use std::sync::Arc;

use jar_manifest::{Attributes, Manifest};
use sha2::digest::DynDigest;

use crate::digest::{decode_digest, DigestAlgorithm, DigestPolicy};
use crate::error::TrustViolation;
use crate::signature::{same_signers, Signers};

const DIGEST_SUFFIX: &str = "-Digest";

struct ArmedDigest {
    algorithm: DigestAlgorithm,
    hasher: Box<dyn DynDigest + Send>,
    expected: Vec<u8>,
}

/// Hashes one entry's bytes against the digests in its manifest section.
///
/// Owned by a single entry stream, so hashing needs no lock. The archive's
/// [`JarVerifier`](super::JarVerifier) arms it in `begin_entry` and settles
/// the result in `end_entry`.
pub struct ManifestEntryVerifier {
    manifest: Arc<Manifest>,
    policy: DigestPolicy,
    name: Option<String>,
    digests: Vec<ArmedDigest>,
    skip: bool,
}

impl ManifestEntryVerifier {
    pub fn new(manifest: Arc<Manifest>, policy: DigestPolicy) -> Self {
        Self {
            manifest,
            policy,
            name: None,
            digests: Vec::new(),
            skip: true,
        }
    }

    /// Arm digests for `name`, or disarm with `None`.
    ///
    /// The manifest section is looked up as `name`, then `./name`, then
    /// `/name`. Only `<ALG>-Digest` attributes whose algorithm is supported
    /// and not disabled are armed; the presence of any `-Digest` attribute
    /// at all makes the entry subject to verification.
    pub fn set_entry(&mut self, name: Option<&str>) {
        self.name = None;
        self.digests.clear();
        self.skip = true;

        let Some(name) = name else {
            return;
        };
        let Some(attributes) = self.section(name) else {
            return;
        };

        let mut skip = true;
        let mut digests = Vec::new();
        for (key, value) in attributes.iter() {
            let Some(prefix) = key.strip_suffix_ignore_case(DIGEST_SUFFIX) else {
                continue;
            };
            skip = false;
            if let Some(algorithm) = self.policy.resolve(prefix) {
                digests.push(ArmedDigest {
                    algorithm,
                    hasher: algorithm.hasher(),
                    expected: decode_digest(value),
                });
            }
        }

        self.skip = skip;
        self.digests = digests;
        self.name = Some(name.to_string());
    }

    fn section(&self, name: &str) -> Option<&Attributes> {
        self.manifest
            .attributes(name)
            .or_else(|| self.manifest.attributes(&format!("./{}", name)))
            .or_else(|| self.manifest.attributes(&format!("/{}", name)))
    }

    /// Name of the armed entry
    pub fn entry_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether bytes fed to this verifier are hashed
    pub fn is_armed(&self) -> bool {
        !self.skip
    }

    pub fn update(&mut self, bytes: &[u8]) {
        if self.skip {
            return;
        }
        for digest in &mut self.digests {
            digest.hasher.update(bytes);
        }
    }

    /// Finish hashing and settle the entry's signers.
    ///
    /// On success the entry's claimed signers move to `verified`. An entry
    /// that was already verified keeps its signers; a different set under
    /// the same name is a conflict.
    pub fn verify(
        &mut self,
        verified: &mut HashMap<String, Signers>,
        claimed: &mut HashMap<String, Signers>,
    ) -> Result<Option<Signers>, TrustViolation> {
        if self.skip {
            return Ok(None);
        }
        let Some(name) = self.name.clone() else {
            return Ok(None);
        };
        if self.digests.is_empty() {
            return Err(TrustViolation::DigestMissing { name });
        }

        for digest in std::mem::take(&mut self.digests) {
            let computed = digest.hasher.finalize();
            log::trace!("{} {} digest computed for {}", digest.algorithm, hex::encode(&computed), name);
            if *computed != *digest.expected {
                return Err(TrustViolation::DigestMismatch {
                    name,
                    algorithm: digest.algorithm.name().to_string(),
                });
            }
        }
        self.skip = true;

        match claimed.remove(&name) {
            Some(signers) => {
                if let Some(existing) = verified.get(&name) {
                    if !same_signers(existing, &signers) {
                        return Err(TrustViolation::ConflictingSigners { name });
                    }
                    return Ok(Some(existing.clone()));
                }
                verified.insert(name, signers.clone());
                Ok(Some(signers))
            }
            None => Ok(verified.get(&name).cloned()),
        }
    }
}
