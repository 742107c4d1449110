//! DID signature verification for payment-authorization requests.
//!
//! Verification is pure and side-effect free: callers persist the outcome
//! (`signature_verified`) as part of the request metadata. This sits on the
//! hot path of every write, so it does a single parse + one Ed25519 verify
//! and nothing else.

use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;

use crate::crypto::did::{self, DidError, PublicKey32};
use crate::crypto::hash::{request_signing_hash, Hash256};

/// Ed25519 signature (64 bytes)
pub type Signature64 = [u8; SIGNATURE_LENGTH];

/// Ed25519 secret key (32 bytes)
pub type SecretKey32 = [u8; SECRET_KEY_LENGTH];

/// Error type for signature verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid DID format: {0}")]
    InvalidDid(#[from] DidError),

    #[error("invalid signature format")]
    InvalidSignatureFormat,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("signature verification failed")]
    VerificationFailed,
}

/// Successful verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// The DID whose key verified the signature.
    pub signer_did: String,
}

/// Verify a DID-signed payment-authorization payload.
///
/// The signature is an Ed25519 signature over the domain-separated signing
/// hash of the canonical (JCS) payload bytes. Any mismatch, malformed
/// signature, malformed DID, or malformed payload returns a typed error;
/// this function never panics on attacker-controlled input.
pub fn verify_request_signature(
    did: &str,
    signature_hex: &str,
    payload: &serde_json::Value,
) -> Result<Verified, SignatureError> {
    let public_key = did::parse_did_key(did)?;
    let signature = signature_from_hex(signature_hex)?;
    let signing_hash = request_signing_hash(payload)
        .map_err(|e| SignatureError::MalformedPayload(e.to_string()))?;

    verify_hash(&public_key, &signing_hash, &signature)?;

    Ok(Verified {
        signer_did: did.to_string(),
    })
}

/// Verify a raw signature over a 32-byte signing hash.
pub fn verify_hash(
    public_key: &PublicKey32,
    signing_hash: &Hash256,
    signature: &Signature64,
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| SignatureError::VerificationFailed)?;
    let sig = Signature::from_bytes(signature);

    verifying_key
        .verify(signing_hash, &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Parse a signature from a hex string (with or without a 0x prefix).
pub fn signature_from_hex(hex_str: &str) -> Result<Signature64, SignatureError> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(hex_str).map_err(|_| SignatureError::InvalidSignatureFormat)?;
    bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureFormat)
}

/// Convert signature bytes to a hex string with a 0x prefix.
pub fn signature_to_hex(signature: &Signature64) -> String {
    format!("0x{}", hex::encode(signature))
}

// ============================================================================
// Agent Signing Key
// ============================================================================

/// Agent signing keypair. Used by test fixtures and registration tooling;
/// the service itself only ever verifies.
#[derive(Clone)]
pub struct AgentSigningKey {
    signing_key: SigningKey,
}

impl AgentSigningKey {
    /// Generate a new random signing key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from secret key bytes
    pub fn from_bytes(bytes: &SecretKey32) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// The `did:key` identifier for this keypair.
    pub fn did(&self) -> String {
        did::encode_did_key(&self.signing_key.verifying_key().to_bytes())
    }

    /// Get the public key bytes
    pub fn public_key_bytes(&self) -> PublicKey32 {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a payload the way a submitting agent would: Ed25519 over the
    /// domain-separated canonical signing hash.
    pub fn sign_payload(&self, payload: &serde_json::Value) -> Result<Signature64, SignatureError> {
        let signing_hash = request_signing_hash(payload)
            .map_err(|e| SignatureError::MalformedPayload(e.to_string()))?;
        Ok(self.signing_key.sign(&signing_hash).to_bytes())
    }
}

impl std::fmt::Debug for AgentSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSigningKey")
            .field("did", &self.did())
            .finish_non_exhaustive()
    }
}
