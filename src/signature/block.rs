//! Ed25519 signature blocks
//!
//! A block is a small JSON document naming the signer, carrying its public
//! key and an Ed25519 signature over the companion signature file's bytes.
//! The signature file may be embedded in the block (`content`), in which
//! case the block does not wait for a separate `.SF` entry.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SignatureError;

/// Signature algorithm identifier
pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

/// A signer identity confirmed by a signature block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeSigner {
    /// Display name from the block
    pub name: String,

    /// SHA-256 fingerprint of the signing public key (hex-encoded)
    pub fingerprint: String,

    /// When the block was signed
    pub signed_at: DateTime<Utc>,
}

/// Signature block document (`META-INF/<BASE>.EC`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Signature algorithm identifier (always "Ed25519")
    pub signature_algorithm: String,

    /// Signer display name
    pub signer: String,

    /// Base64-encoded Ed25519 public key
    pub public_key: String,

    /// Base64-encoded signature over the signature file bytes
    pub signature: String,

    pub signed_at: DateTime<Utc>,

    /// Base64-encoded signature file, when embedded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SignatureBlock {
    /// Sign `signature_file` with `key`. With `embed`, the signature file is
    /// carried inside the block.
    pub fn sign(signer: &str, key: &SigningKey, signature_file: &[u8], embed: bool) -> Self {
        let signature = key.sign(signature_file);
        Self {
            signature_algorithm: SIGNATURE_ALGORITHM.to_string(),
            signer: signer.to_string(),
            public_key: encode_verifying_key(&key.verifying_key()),
            signature: STANDARD.encode(signature.to_bytes()),
            signed_at: Utc::now(),
            content: embed.then(|| STANDARD.encode(signature_file)),
        }
    }

    /// Parse a block from its raw entry bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        serde_json::from_slice(bytes).map_err(|e| SignatureError::MalformedBlock(e.to_string()))
    }

    /// Serialize to pretty JSON
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Whether the companion `.SF` entry is required
    pub fn needs_signature_file(&self) -> bool {
        self.content.is_none()
    }

    /// Decoded embedded signature file, if any
    pub fn embedded_signature_file(&self) -> Result<Option<Vec<u8>>, SignatureError> {
        self.content
            .as_deref()
            .map(|c| STANDARD.decode(c).map_err(SignatureError::from))
            .transpose()
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, SignatureError> {
        decode_verifying_key(&self.public_key)
    }

    /// Check the signature over `signature_file` and return the signer.
    ///
    /// When `trusted` is non-empty the key fingerprint must be listed.
    pub fn verify(
        &self,
        signature_file: &[u8],
        trusted: &[String],
    ) -> Result<CodeSigner, SignatureError> {
        if self.signature_algorithm != SIGNATURE_ALGORITHM {
            return Err(SignatureError::UnsupportedAlgorithm(
                self.signature_algorithm.clone(),
            ));
        }

        let verifying_key = self.verifying_key()?;
        let fingerprint = compute_key_fingerprint(&verifying_key);
        if !trusted.is_empty() && !trusted.iter().any(|t| t.eq_ignore_ascii_case(&fingerprint)) {
            return Err(SignatureError::UntrustedSigner { fingerprint });
        }

        let sig_bytes = STANDARD.decode(&self.signature)?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| SignatureError::MalformedBlock(e.to_string()))?;
        verifying_key
            .verify(signature_file, &signature)
            .map_err(|_| SignatureError::InvalidSignature(self.signer.clone()))?;

        Ok(CodeSigner {
            name: self.signer.clone(),
            fingerprint,
            signed_at: self.signed_at,
        })
    }
}

/// Compute SHA-256 fingerprint of an Ed25519 public key
pub fn compute_key_fingerprint(key: &VerifyingKey) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Generate a new Ed25519 keypair
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

/// Encode a signing key to base64 for storage
pub fn encode_signing_key(key: &SigningKey) -> String {
    STANDARD.encode(key.to_bytes())
}

/// Decode a signing key from base64
pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, SignatureError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let bytes_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidKey("key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&bytes_array))
}

/// Encode a verifying key to base64
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Decode a verifying key from base64
pub fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let bytes_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidKey("key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes_array).map_err(|e| SignatureError::InvalidKey(e.to_string()))
}
