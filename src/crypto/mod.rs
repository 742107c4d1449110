//! Cryptographic primitives: DID parsing, canonical hashing, and signature
//! verification.

pub mod did;
pub mod hash;
pub mod signing;

pub use did::{encode_did_key, parse_did_key, DidError, PublicKey32, DID_KEY_PREFIX};
pub use hash::{canonicalize_json, payload_hash, request_signing_hash, Hash256};
pub use signing::{
    signature_from_hex, signature_to_hex, verify_request_signature, AgentSigningKey,
    Signature64, SignatureError, Verified,
};
