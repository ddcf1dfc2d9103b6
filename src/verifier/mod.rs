//! Archive signature verifier
//!
//! One [`JarVerifier`] per archive. It ingests the manifest, signature files
//! and signature blocks in the order the archive lists them, then checks
//! ordinary entries as they are read.
//!
//! Phases:
//! - `ParsingMeta`: classifying META-INF entries.
//! - `ParsingBlockOrSf`: buffering one signature file or block.
//! - `DoneWithMeta`: ingestion finished; entries are only verified.
//!
//! The first entry that is neither the manifest nor signature-related ends
//! ingestion, so signature files listed after ordinary entries are never
//! seen. Such archives are accepted and simply verify less.
//!
//! Signers live in two maps. `claimed` holds names whose manifest section a
//! signer vouches for; `verified` holds names whose bytes were also hashed
//! and matched. A full read of an entry moves it from the first to the
//! second.

mod entry;
mod stream;

pub use entry::ManifestEntryVerifier;
pub use stream::VerifyingEntryStream;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jar_manifest::{Manifest, TrustPredicate, MANIFEST_NAME};

use crate::config::VerifierConfig;
use crate::digest::DigestPolicy;
use crate::error::{SignatureError, TrustViolation};
use crate::signature::{
    base_name, is_block_or_sf, normalize_entry_name, same_signers, signature_file_kind,
    BlockOutcome, BlockReport, CodeSigner, ManifestDigester, SignatureFileKind,
    SignatureFileVerifier, Signers, META_INF,
};

const INDEX_NAME: &str = "META-INF/INDEX.LIST";

/// Ingestion phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ParsingMeta,
    ParsingBlockOrSf,
    DoneWithMeta,
}

/// State that only exists while META-INF entries are ingested
struct MetaState {
    /// Raw manifest, consumed when the digester is first needed
    raw_manifest: Option<Vec<u8>>,
    digester: Option<ManifestDigester>,
    /// Bytes of the signature file or block being read
    buffer: Vec<u8>,
    current: Option<String>,
    /// Signature file bytes keyed by [`base_name`]
    signature_files: HashMap<String, Vec<u8>>,
    /// Blocks waiting for their signature file
    pending: Vec<SignatureFileVerifier>,
    /// Distinct signer sets handed out so far
    signer_cache: Vec<Signers>,
}

/// Per-archive signature verifier
pub struct JarVerifier {
    manifest: Arc<Manifest>,
    phase: Phase,
    meta: Option<MetaState>,
    verified: HashMap<String, Signers>,
    claimed: HashMap<String, Signers>,
    reports: Vec<BlockReport>,
    any_to_verify: bool,
    policy: DigestPolicy,
    trusted_signers: Vec<String>,
}

/// Lock a verifier, recovering the state if another reader panicked.
pub fn lock_verifier(verifier: &Mutex<JarVerifier>) -> MutexGuard<'_, JarVerifier> {
    verifier.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JarVerifier {
    /// Verifier for an archive whose manifest parsed to `manifest` from
    /// `raw_manifest`.
    pub fn new(manifest: Arc<Manifest>, raw_manifest: Vec<u8>, config: &VerifierConfig) -> Self {
        Self {
            manifest,
            phase: Phase::ParsingMeta,
            meta: Some(MetaState {
                raw_manifest: Some(raw_manifest),
                digester: None,
                buffer: Vec::new(),
                current: None,
                signature_files: HashMap::new(),
                pending: Vec::new(),
                signer_cache: Vec::new(),
            }),
            verified: HashMap::new(),
            claimed: HashMap::new(),
            reports: Vec::new(),
            any_to_verify: false,
            policy: config.digest_policy(),
            trusted_signers: config.trusted_fingerprints(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_parsing_meta(&self) -> bool {
        self.phase != Phase::DoneWithMeta
    }

    /// A fresh, disarmed entry verifier bound to this archive's manifest
    pub fn entry_verifier(&self) -> ManifestEntryVerifier {
        ManifestEntryVerifier::new(Arc::clone(&self.manifest), self.policy.clone())
    }

    /// Start reading `name`. Arms `mev` when the entry has signers.
    pub fn begin_entry(&mut self, name: &str, is_directory: bool, mev: &mut ManifestEntryVerifier) {
        mev.set_entry(None);

        if self.is_parsing_meta() {
            let upper = name.to_ascii_uppercase();
            if upper.starts_with(META_INF) || upper.starts_with("/META-INF/") {
                if is_directory || upper == MANIFEST_NAME || upper == INDEX_NAME {
                    return;
                }
                if is_block_or_sf(&upper) {
                    self.phase = Phase::ParsingBlockOrSf;
                    if let Some(meta) = self.meta.as_mut() {
                        meta.buffer.clear();
                        meta.current = Some(name.to_string());
                    }
                    return;
                }
            }
            self.done_with_meta();
        }

        if is_directory {
            return;
        }
        let name = normalize_entry_name(name);
        if name != MANIFEST_NAME
            && (self.claimed.contains_key(name) || self.verified.contains_key(name))
        {
            mev.set_entry(Some(name));
        }
    }

    /// Feed entry bytes. Signature-related files are buffered; anything
    /// else goes to `mev`.
    pub fn update(&mut self, bytes: &[u8], mev: &mut ManifestEntryVerifier) {
        if self.phase == Phase::ParsingBlockOrSf {
            if let Some(meta) = self.meta.as_mut() {
                meta.buffer.extend_from_slice(bytes);
            }
        } else {
            mev.update(bytes);
        }
    }

    /// The current entry is complete.
    ///
    /// For an ordinary entry this checks its digests and returns its
    /// signers. For signature-related files it processes what was buffered.
    pub fn end_entry(
        &mut self,
        mev: &mut ManifestEntryVerifier,
    ) -> Result<Option<Signers>, TrustViolation> {
        if self.phase != Phase::ParsingBlockOrSf {
            return mev.verify(&mut self.verified, &mut self.claimed);
        }
        self.phase = Phase::ParsingMeta;

        let Some(meta) = self.meta.as_mut() else {
            return Ok(None);
        };
        let Some(name) = meta.current.take() else {
            return Ok(None);
        };
        let bytes = std::mem::take(&mut meta.buffer);
        let key = base_name(&name);

        match signature_file_kind(&name) {
            Some(SignatureFileKind::SignatureFile) => {
                let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut meta.pending)
                    .into_iter()
                    .partition(|sfv| sfv.base_name() == key);
                meta.pending = waiting;
                meta.signature_files.insert(key, bytes.clone());
                for mut sfv in ready {
                    log::debug!("{}: resolving pending block {}", name, sfv.block_name());
                    sfv.set_signature_file(bytes.clone());
                    self.process_block(sfv)?;
                }
            }
            Some(SignatureFileKind::Block) => {
                let mut sfv = match SignatureFileVerifier::new(&name, &bytes) {
                    Ok(sfv) => sfv,
                    Err(e) => {
                        self.record_unverifiable(name, e);
                        return Ok(None);
                    }
                };
                if sfv.needs_signature_file() {
                    match meta.signature_files.get(&key) {
                        Some(sf) => sfv.set_signature_file(sf.clone()),
                        None => {
                            log::debug!("{}: signature file not seen yet, block pending", name);
                            meta.pending.push(sfv);
                            return Ok(None);
                        }
                    }
                }
                self.process_block(sfv)?;
            }
            None => {}
        }
        Ok(None)
    }

    fn process_block(&mut self, sfv: SignatureFileVerifier) -> Result<(), TrustViolation> {
        let Some(meta) = self.meta.as_mut() else {
            return Ok(());
        };
        let raw_manifest = &mut meta.raw_manifest;
        let digester = meta.digester.get_or_insert_with(|| {
            ManifestDigester::new(raw_manifest.take().unwrap_or_default())
        });

        let outcome = sfv.process(digester, &self.policy, &self.trusted_signers, MANIFEST_NAME)?;
        match &outcome {
            BlockOutcome::Resolved { signer, names } => {
                for name in names {
                    merge_signer(&mut self.claimed, &mut meta.signer_cache, name, signer);
                }
            }
            BlockOutcome::Unverifiable(e) => {
                log::debug!("{}: ignoring signature block: {}", sfv.block_name(), e);
            }
        }
        self.reports.push(BlockReport {
            block: sfv.block_name().to_string(),
            outcome,
        });
        Ok(())
    }

    fn record_unverifiable(&mut self, block: String, error: SignatureError) {
        log::debug!("{}: ignoring signature block: {}", block, error);
        self.reports.push(BlockReport {
            block,
            outcome: BlockOutcome::Unverifiable(error),
        });
    }

    /// End ingestion. Idempotent.
    ///
    /// Releases ingestion buffers, gives up on blocks still waiting for a
    /// signature file, and moves the manifest's own signers to `verified`.
    pub fn done_with_meta(&mut self) {
        if self.phase == Phase::DoneWithMeta {
            return;
        }
        self.phase = Phase::DoneWithMeta;
        log::debug!("done with META-INF, {} names claimed", self.claimed.len());

        if let Some(meta) = self.meta.take() {
            for sfv in meta.pending {
                let block = sfv.block_name().to_string();
                self.record_unverifiable(block.clone(), SignatureError::MissingSignatureFile(block));
            }
        }

        self.any_to_verify = !self.claimed.is_empty();
        if let Some(signers) = self.claimed.remove(MANIFEST_NAME) {
            self.verified.insert(MANIFEST_NAME.to_string(), signers);
        }
    }

    /// True when no block resolved; the caller may drop the verifier and
    /// treat the archive as unsigned.
    pub fn nothing_to_verify(&self) -> bool {
        !self.any_to_verify
    }

    /// Signers confirmed by hashing the entry's bytes
    pub fn verified_signers(&self, name: &str) -> Option<&Signers> {
        self.verified.get(name)
    }

    /// Signers confirmed only against the manifest section so far
    pub fn claimed_signers(&self, name: &str) -> Option<&Signers> {
        self.claimed.get(name)
    }

    /// Signers from either map
    pub fn signers(&self, name: &str) -> Option<&Signers> {
        self.verified.get(name).or_else(|| self.claimed.get(name))
    }

    pub fn block_reports(&self) -> &[BlockReport] {
        &self.reports
    }

    /// Names with verified signers
    pub fn verified_names(&self) -> impl Iterator<Item = &str> {
        self.verified.keys().map(String::as_str)
    }

    /// Names still waiting for a full read
    pub fn claimed_names(&self) -> impl Iterator<Item = &str> {
        self.claimed.keys().map(String::as_str)
    }

    /// Does `name` have exactly as many signers as the manifest itself?
    ///
    /// With an unsigned manifest every entry is trusted.
    pub fn is_trusted_manifest_entry(&self, name: &str) -> bool {
        let Some(manifest_signers) = self.verified.get(MANIFEST_NAME) else {
            return true;
        };
        self.claimed
            .get(name)
            .or_else(|| self.verified.get(name))
            .is_some_and(|signers| signers.len() == manifest_signers.len())
    }
}

impl TrustPredicate for JarVerifier {
    fn is_trusted_manifest_entry(&self, name: &str) -> bool {
        JarVerifier::is_trusted_manifest_entry(self, name)
    }
}

/// Add `signer` to the claimed set for `name`, reusing an identical set
/// from `cache` when one exists.
fn merge_signer(
    claimed: &mut HashMap<String, Signers>,
    cache: &mut Vec<Signers>,
    name: &str,
    signer: &CodeSigner,
) {
    let merged: Vec<CodeSigner> = match claimed.get(name) {
        Some(existing) if existing.contains(signer) => return,
        Some(existing) => existing.iter().cloned().chain([signer.clone()]).collect(),
        None => vec![signer.clone()],
    };

    let shared = match cache.iter().find(|s| same_signers(s, &merged)) {
        Some(shared) => Arc::clone(shared),
        None => {
            let shared: Signers = merged.into();
            cache.push(Arc::clone(&shared));
            shared
        }
    };
    claimed.insert(name.to_string(), shared);
}
