//! jar-verify - JAR signature verification
//!
//! Reads archive manifests and verifies entry bytes against the digests
//! that signature files vouch for, while the caller streams them. The
//! manifest format itself lives in the `jar-manifest` crate.

pub mod archive;
pub mod config;
pub mod digest;
pub mod error;
pub mod jar_file;
pub mod signature;
pub mod signer;
pub mod verifier;

pub use archive::{ArchiveSource, DirectoryArchive, EntryMetadata, JarEntry, MemoryArchive};
pub use config::{ConfigError, MultiReleaseMode, VerifierConfig};
pub use digest::{DigestAlgorithm, DigestPolicy};
pub use error::{JarError, JarResult, SignatureError, TrustViolation};
pub use jar_file::{EntryStream, JarFile, SignerStatus};
pub use signature::{BlockOutcome, BlockReport, CodeSigner, SignatureBlock, Signers};
pub use signer::{JarSigner, SignedFiles, SigningError};
pub use verifier::{JarVerifier, ManifestEntryVerifier, Phase, VerifyingEntryStream};

pub use jar_manifest::{self as manifest, Attributes, AttributeName, Manifest, MANIFEST_NAME};
