//! Decentralized identifier (DID) parsing for agent identities.
//!
//! Agents are identified by `did:key` identifiers carrying an Ed25519 public
//! key: `did:key:z` followed by the base58btc multibase encoding of the
//! multicodec prefix `0xED 0x01` and the 32-byte key. The key material is
//! recoverable from the identifier itself, so verification needs no external
//! key registry.

use ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Ed25519 public key (32 bytes)
pub type PublicKey32 = [u8; PUBLIC_KEY_LENGTH];

/// Required DID method prefix
pub const DID_KEY_PREFIX: &str = "did:key:z";

/// Multicodec prefix for Ed25519 public keys
const MULTICODEC_ED25519: [u8; 2] = [0xED, 0x01];

/// Shortest well-formed `did:key` identifier we accept. The base58btc
/// encoding of 34 bytes is at least 46 characters.
pub const MIN_DID_LENGTH: usize = DID_KEY_PREFIX.len() + 46;

/// Error type for DID parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DidError {
    #[error("unrecognized DID scheme, expected did:key")]
    UnrecognizedScheme,

    #[error("DID is shorter than the minimum well-formed length")]
    TooShort,

    #[error("invalid multibase encoding in DID")]
    InvalidEncoding,

    #[error("DID does not carry an Ed25519 public key")]
    UnsupportedKeyType,
}

/// Parse a `did:key` identifier and extract its Ed25519 public key.
///
/// Never panics on malformed input; every failure mode maps to a typed
/// [`DidError`].
pub fn parse_did_key(did: &str) -> Result<PublicKey32, DidError> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or(DidError::UnrecognizedScheme)?;

    if did.len() < MIN_DID_LENGTH {
        return Err(DidError::TooShort);
    }

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| DidError::InvalidEncoding)?;

    if bytes.len() != 2 + PUBLIC_KEY_LENGTH {
        return Err(DidError::InvalidEncoding);
    }
    if bytes[..2] != MULTICODEC_ED25519 {
        return Err(DidError::UnsupportedKeyType);
    }

    let mut key = [0u8; PUBLIC_KEY_LENGTH];
    key.copy_from_slice(&bytes[2..]);
    Ok(key)
}

/// Encode an Ed25519 public key as a `did:key` identifier.
pub fn encode_did_key(public_key: &PublicKey32) -> String {
    let mut bytes = Vec::with_capacity(2 + PUBLIC_KEY_LENGTH);
    bytes.extend_from_slice(&MULTICODEC_ED25519);
    bytes.extend_from_slice(public_key);
    format!("{}{}", DID_KEY_PREFIX, bs58::encode(bytes).into_string())
}
