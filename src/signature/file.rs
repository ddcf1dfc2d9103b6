//! Signature file processing and construction
//!
//! Verifying side: a [`SignatureFileVerifier`] pairs one signature block
//! with its signature file and decides which manifest sections that signer
//! vouches for. Building side: [`SignatureFileBuilder`] produces the
//! signature file for a manifest.

use jar_manifest::{AttributeName, Manifest};

use crate::digest::{decode_digest, encode_digest, DigestAlgorithm, DigestPolicy};
use crate::error::{SignatureError, TrustViolation};
use crate::signature::block::{CodeSigner, SignatureBlock};
use crate::signature::digester::ManifestDigester;
use crate::signature::{base_name, normalize_entry_name};

const DIGEST_SUFFIX: &str = "-Digest";
const DIGEST_MANIFEST_SUFFIX: &str = "-Digest-Manifest";
const DIGEST_MAIN_ATTRIBUTES_SUFFIX: &str = "-Digest-Manifest-Main-Attributes";

/// What a signature block contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block's signer vouches for these (normalized) entry names.
    /// The manifest name is always included.
    Resolved {
        signer: CodeSigner,
        names: Vec<String>,
    },
    /// The block could not be used; it contributes no signers.
    Unverifiable(SignatureError),
}

impl BlockOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, BlockOutcome::Resolved { .. })
    }
}

/// Outcome of one signature block, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    /// Entry name of the block, e.g. `META-INF/SIGNER.EC`
    pub block: String,
    pub outcome: BlockOutcome,
}

/// A parsed signature block waiting for, or holding, its signature file
#[derive(Debug, Clone)]
pub struct SignatureFileVerifier {
    block_name: String,
    base: String,
    block: SignatureBlock,
    signature_file: Option<Vec<u8>>,
}

impl SignatureFileVerifier {
    /// Parse the block entry `block_name` from its raw bytes.
    pub fn new(block_name: &str, raw_block: &[u8]) -> Result<Self, SignatureError> {
        let block = SignatureBlock::from_bytes(raw_block)?;
        let signature_file = block.embedded_signature_file()?;
        Ok(Self {
            block_name: block_name.to_string(),
            base: base_name(block_name),
            block,
            signature_file,
        })
    }

    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    /// Key shared with the companion signature file, see [`base_name`]
    pub fn base_name(&self) -> &str {
        &self.base
    }

    pub fn needs_signature_file(&self) -> bool {
        self.signature_file.is_none()
    }

    pub fn set_signature_file(&mut self, bytes: Vec<u8>) {
        self.signature_file = Some(bytes);
    }

    /// Verify the block and work out which manifest sections it signs.
    ///
    /// Problems with the block or signature file itself are returned as
    /// [`BlockOutcome::Unverifiable`]; only a main-attributes digest
    /// mismatch is a trust violation.
    pub fn process(
        &self,
        digester: &mut ManifestDigester,
        policy: &DigestPolicy,
        trusted_signers: &[String],
        manifest_name: &str,
    ) -> Result<BlockOutcome, TrustViolation> {
        let Some(sf_bytes) = self.signature_file.as_deref() else {
            return Ok(BlockOutcome::Unverifiable(SignatureError::MissingSignatureFile(
                self.block_name.clone(),
            )));
        };

        let signer = match self.block.verify(sf_bytes, trusted_signers) {
            Ok(signer) => signer,
            Err(e) => return Ok(BlockOutcome::Unverifiable(e)),
        };

        let sf = match Manifest::from_bytes(sf_bytes) {
            Ok(sf) => sf,
            Err(e) => {
                return Ok(BlockOutcome::Unverifiable(
                    SignatureError::UnparsableSignatureFile {
                        name: self.block_name.clone(),
                        reason: e.to_string(),
                    },
                ))
            }
        };

        let manifest_signed = verify_manifest_hash(&sf, digester, policy);
        if !manifest_signed {
            verify_main_attributes(&sf, digester, policy, &self.block_name)?;
        }

        let mut names = Vec::with_capacity(sf.entries().len() + 1);
        for (name, attributes) in sf.entries() {
            if manifest_signed || verify_section(attributes, name, digester, policy) {
                names.push(normalize_entry_name(name).to_string());
            } else {
                log::debug!("{}: section for {} not signed", self.block_name, name);
            }
        }
        names.push(manifest_name.to_string());

        log::debug!(
            "{}: signer {} vouches for {} names (whole manifest: {})",
            self.block_name,
            signer.name,
            names.len(),
            manifest_signed
        );
        Ok(BlockOutcome::Resolved { signer, names })
    }
}

/// Digest algorithms named by attributes ending in `suffix`
fn digest_attributes<'a>(
    attributes: &'a jar_manifest::Attributes,
    suffix: &'a str,
    policy: &'a DigestPolicy,
) -> impl Iterator<Item = (DigestAlgorithm, &'a str)> + 'a {
    attributes.iter().filter_map(move |(name, value)| {
        let prefix = name.strip_suffix_ignore_case(suffix)?;
        Some((policy.resolve(prefix)?, value))
    })
}

/// Does any `<ALG>-Digest-Manifest` match the whole manifest?
fn verify_manifest_hash(sf: &Manifest, digester: &mut ManifestDigester, policy: &DigestPolicy) -> bool {
    let mut signed = false;
    for (algorithm, value) in digest_attributes(sf.main_attributes(), DIGEST_MANIFEST_SUFFIX, policy) {
        let computed = digester.manifest_digest(algorithm);
        if computed == decode_digest(value).as_slice() {
            signed = true;
        } else {
            log::trace!("{} whole-manifest digest does not match", algorithm);
        }
    }
    signed
}

fn verify_main_attributes(
    sf: &Manifest,
    digester: &ManifestDigester,
    policy: &DigestPolicy,
    block_name: &str,
) -> Result<(), TrustViolation> {
    for (algorithm, value) in digest_attributes(sf.main_attributes(), DIGEST_MAIN_ATTRIBUTES_SUFFIX, policy) {
        if digester.main_attributes_digest(algorithm) != decode_digest(value) {
            return Err(TrustViolation::InvalidMainAttributesDigest {
                signature_file: block_name.to_string(),
                algorithm: algorithm.name().to_string(),
            });
        }
    }
    Ok(())
}

/// A section is signed when at least one supported digest matches and none
/// mismatches.
fn verify_section(
    attributes: &jar_manifest::Attributes,
    name: &str,
    digester: &ManifestDigester,
    policy: &DigestPolicy,
) -> bool {
    let mut verified = false;
    for (algorithm, value) in digest_attributes(attributes, DIGEST_SUFFIX, policy) {
        let Some(computed) = digester.entry_digest(name, algorithm) else {
            log::debug!("no manifest section for signature file entry {}", name);
            return false;
        };
        if computed != decode_digest(value) {
            log::trace!("{} section digest mismatch for {}", algorithm, name);
            return false;
        }
        verified = true;
    }
    verified
}

/// Builds the signature file for a manifest
#[derive(Debug, Clone)]
pub struct SignatureFileBuilder {
    algorithm: DigestAlgorithm,
    created_by: String,
}

impl SignatureFileBuilder {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            created_by: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Signature file for `manifest_bytes`: whole-manifest and
    /// main-attributes digests, then one digest per manifest section.
    pub fn build(&self, manifest_bytes: &[u8]) -> Manifest {
        let mut digester = ManifestDigester::new(manifest_bytes.to_vec());
        let mut sf = Manifest::new();

        let main = sf.main_attributes_mut();
        main.insert(AttributeName::SIGNATURE_VERSION, "1.0");
        main.insert(AttributeName::CREATED_BY, self.created_by.as_str());
        main.insert(
            self.algorithm.manifest_attribute(),
            encode_digest(digester.manifest_digest(self.algorithm)),
        );
        main.insert(
            self.algorithm.main_attributes_attribute(),
            encode_digest(&digester.main_attributes_digest(self.algorithm)),
        );

        let names: Vec<String> = digester.entry_names().map(str::to_string).collect();
        for name in names {
            if let Some(digest) = digester.entry_digest(&name, self.algorithm) {
                sf.attributes_mut(&name)
                    .insert(self.algorithm.digest_attribute(), encode_digest(&digest));
            }
        }
        sf
    }

    pub fn build_bytes(&self, manifest_bytes: &[u8]) -> Vec<u8> {
        self.build(manifest_bytes).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::block::generate_keypair;
    use jar_manifest::MANIFEST_NAME;

    const MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\n\r\n\
Name: a/A.class\r\nSHA-256-Digest: aaa=\r\n\r\n\
Name: b/B.class\r\nSHA-256-Digest: bbb=\r\n\r\n";

    fn verifier_for(sf: &[u8]) -> SignatureFileVerifier {
        let key = generate_keypair();
        let block = SignatureBlock::sign("tester", &key, sf, false);
        let mut verifier =
            SignatureFileVerifier::new("META-INF/TESTER.EC", &block.to_bytes().unwrap()).unwrap();
        verifier.set_signature_file(sf.to_vec());
        verifier
    }

    fn process(sf: &[u8]) -> Result<BlockOutcome, TrustViolation> {
        let mut digester = ManifestDigester::new(MANIFEST.to_vec());
        verifier_for(sf).process(&mut digester, &DigestPolicy::default(), &[], MANIFEST_NAME)
    }

    fn resolved_names(outcome: BlockOutcome) -> Vec<String> {
        match outcome {
            BlockOutcome::Resolved { names, .. } => names,
            BlockOutcome::Unverifiable(e) => panic!("unexpected unverifiable block: {e}"),
        }
    }

    #[test]
    fn test_whole_manifest_digest_signs_every_section() {
        let sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256).build_bytes(MANIFEST);
        let names = resolved_names(process(&sf).unwrap());
        assert_eq!(names, vec!["a/A.class", "b/B.class", MANIFEST_NAME]);
    }

    #[test]
    fn test_per_section_fallback() {
        let mut sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256).build(MANIFEST);
        sf.main_attributes_mut()
            .insert(AttributeName::SHA_256_DIGEST_MANIFEST, encode_digest(b"stale"));
        sf.attributes_mut("b/B.class")
            .insert(AttributeName::SHA_256_DIGEST, encode_digest(b"wrong"));

        let names = resolved_names(process(&sf.to_bytes()).unwrap());
        assert_eq!(names, vec!["a/A.class", MANIFEST_NAME]);
    }

    #[test]
    fn test_main_attributes_mismatch_is_violation() {
        let mut sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256).build(MANIFEST);
        sf.main_attributes_mut()
            .insert(AttributeName::SHA_256_DIGEST_MANIFEST, encode_digest(b"stale"));
        sf.main_attributes_mut().insert(
            AttributeName::SHA_256_DIGEST_MANIFEST_MAIN_ATTRIBUTES,
            encode_digest(b"stale"),
        );

        let result = process(&sf.to_bytes());
        assert!(matches!(
            result,
            Err(TrustViolation::InvalidMainAttributesDigest { .. })
        ));
    }

    #[test]
    fn test_section_missing_from_manifest_is_dropped() {
        let mut sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256).build(MANIFEST);
        sf.main_attributes_mut()
            .remove(&AttributeName::SHA_256_DIGEST_MANIFEST);
        sf.attributes_mut("ghost.class")
            .insert(AttributeName::SHA_256_DIGEST, encode_digest(b"x"));

        let names = resolved_names(process(&sf.to_bytes()).unwrap());
        assert!(!names.contains(&"ghost.class".to_string()));
        assert!(names.contains(&"a/A.class".to_string()));
    }

    #[test]
    fn test_names_are_normalized() {
        let manifest = b"Manifest-Version: 1.0\r\n\r\nName: ./x/Y.class\r\nK: v\r\n\r\n";
        let sf = SignatureFileBuilder::new(DigestAlgorithm::Sha1).build_bytes(manifest);
        let mut digester = ManifestDigester::new(manifest.to_vec());
        let outcome = verifier_for(&sf)
            .process(&mut digester, &DigestPolicy::default(), &[], MANIFEST_NAME)
            .unwrap();
        assert_eq!(resolved_names(outcome), vec!["x/Y.class", MANIFEST_NAME]);
    }

    #[test]
    fn test_bad_signature_is_unverifiable() {
        let sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256).build_bytes(MANIFEST);
        let mut verifier = verifier_for(&sf);
        let mut tampered = sf.clone();
        tampered.extend_from_slice(b"Name: extra\r\n\r\n");
        verifier.set_signature_file(tampered);

        let mut digester = ManifestDigester::new(MANIFEST.to_vec());
        let outcome = verifier
            .process(&mut digester, &DigestPolicy::default(), &[], MANIFEST_NAME)
            .unwrap();
        assert!(matches!(
            outcome,
            BlockOutcome::Unverifiable(SignatureError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_missing_signature_file_is_unverifiable() {
        let key = generate_keypair();
        let block = SignatureBlock::sign("tester", &key, b"sf", false);
        let verifier =
            SignatureFileVerifier::new("META-INF/TESTER.EC", &block.to_bytes().unwrap()).unwrap();
        assert!(verifier.needs_signature_file());
        assert_eq!(verifier.base_name(), "META-INF/TESTER");

        let mut digester = ManifestDigester::new(MANIFEST.to_vec());
        let outcome = verifier
            .process(&mut digester, &DigestPolicy::default(), &[], MANIFEST_NAME)
            .unwrap();
        assert!(matches!(
            outcome,
            BlockOutcome::Unverifiable(SignatureError::MissingSignatureFile(_))
        ));
    }

    #[test]
    fn test_builder_layout() {
        let sf = SignatureFileBuilder::new(DigestAlgorithm::Sha256)
            .created_by("tests")
            .build(MANIFEST);
        let main = sf.main_attributes();
        assert_eq!(main.get(&AttributeName::SIGNATURE_VERSION), Some("1.0"));
        assert_eq!(main.get(&AttributeName::CREATED_BY), Some("tests"));
        assert!(main.contains_key(&AttributeName::SHA_256_DIGEST_MANIFEST));
        assert!(main.contains_key(&AttributeName::SHA_256_DIGEST_MANIFEST_MAIN_ATTRIBUTES));
        assert_eq!(sf.entries().len(), 2);
        assert!(sf.to_bytes().starts_with(b"Signature-Version: 1.0\r\n"));
    }
}
