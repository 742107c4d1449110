//! Deterministic payload hashing with domain separation.
//!
//! Signing and idempotency comparison both rely on a canonical byte
//! representation of the opaque request payload:
//! - RFC 8785 JSON Canonicalization Scheme (JCS) for the payload bytes
//! - A domain separation prefix on every hash operation
//!
//! Two payloads are "semantically equal" for idempotency purposes exactly
//! when their canonical hashes are equal: key order and whitespace never
//! matter, value differences always do.

use sha2::{Digest, Sha256};

/// 32-byte SHA-256 hash
pub type Hash256 = [u8; 32];

/// Domain prefix for request payload hashing
pub const DOMAIN_REQUEST_PAYLOAD: &[u8] = b"X402_REQUEST_PAYLOAD_V1";

/// Domain prefix for the request signing preimage
pub const DOMAIN_REQUEST_SIGNING: &[u8] = b"X402_REQUEST_SIGNING_V1";

/// Error produced when a payload cannot be canonicalized.
#[derive(Debug, thiserror::Error)]
#[error("payload canonicalization failed: {0}")]
pub struct CanonicalizeError(String);

/// Convert a JSON value to its RFC 8785 (JCS) canonical string form.
///
/// Keys are sorted lexicographically, whitespace is stripped, and numbers
/// are normalized per ES6 rules, so the same logical document always
/// produces the same bytes.
pub fn canonicalize_json(value: &serde_json::Value) -> Result<String, CanonicalizeError> {
    serde_json_canonicalizer::to_string(value).map_err(|e| CanonicalizeError(e.to_string()))
}

/// Compute the canonical payload hash used for idempotent-replay comparison.
///
/// payload_hash = SHA256(DOMAIN_REQUEST_PAYLOAD || JCS(payload))
pub fn payload_hash(value: &serde_json::Value) -> Result<Hash256, CanonicalizeError> {
    let canonical = canonicalize_json(value)?;

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_REQUEST_PAYLOAD);
    hasher.update(canonical.as_bytes());
    Ok(hasher.finalize().into())
}

/// Compute the 32-byte signing hash an agent signs when authorizing a payment.
///
/// signing_hash = SHA256(DOMAIN_REQUEST_SIGNING || JCS(payload))
pub fn request_signing_hash(payload: &serde_json::Value) -> Result<Hash256, CanonicalizeError> {
    let canonical = canonicalize_json(payload)?;

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_REQUEST_SIGNING);
    hasher.update(canonical.as_bytes());
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalization_sorts_keys() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});

        assert_eq!(
            canonicalize_json(&a).unwrap(),
            canonicalize_json(&b).unwrap()
        );
        assert_eq!(canonicalize_json(&a).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_payload_hash_key_order_invariant() {
        let a = json!({"amount": "1.50", "to": "agent-b"});
        let b = json!({"to": "agent-b", "amount": "1.50"});

        assert_eq!(payload_hash(&a).unwrap(), payload_hash(&b).unwrap());
    }

    #[test]
    fn test_payload_hash_value_sensitive() {
        let a = json!({"amount": "1.50"});
        let b = json!({"amount": "1.51"});

        assert_ne!(payload_hash(&a).unwrap(), payload_hash(&b).unwrap());
    }

    #[test]
    fn test_signing_hash_differs_from_payload_hash() {
        // Domain separation: the signed preimage is never the storage hash.
        let v = json!({"amount": "1.50"});
        assert_ne!(payload_hash(&v).unwrap(), request_signing_hash(&v).unwrap());
    }

    #[test]
    fn test_nested_structures_deterministic() {
        let v = json!({
            "outer": {"z": [1, 2, {"y": "x"}], "a": null},
            "flag": true
        });
        assert_eq!(
            request_signing_hash(&v).unwrap(),
            request_signing_hash(&v).unwrap()
        );
    }
}
