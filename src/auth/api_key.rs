//! API key authentication.
//!
//! Keys are formatted as `xl_<project_prefix><random>` and stored only as
//! SHA-256 hashes.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{AuthContext, AuthError, Permissions};

/// API key prefix
pub const API_KEY_PREFIX: &str = "xl_";

/// API key metadata.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    /// Hash of the API key (never store plaintext)
    pub key_hash: String,

    /// Projects this key can access (empty = all)
    pub project_ids: Vec<Uuid>,

    /// Permissions granted by this key
    pub permissions: Permissions,

    /// Optional agent ID for agent-specific keys
    pub agent_id: Option<Uuid>,

    /// Whether the key is active
    pub active: bool,
}

/// API key validator.
///
/// The registry is read-only at request time; key registration happens at
/// bootstrap. It is never the authority on ledger state.
pub struct ApiKeyValidator {
    keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl ApiKeyValidator {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a new API key. Returns (plaintext_key, key_hash).
    pub fn generate_key(project_id: &Uuid) -> (String, String) {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let random_bytes: [u8; 24] = rng.gen();
        let random_part = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            random_bytes,
        );

        let project_prefix = &project_id.to_string()[..8];
        let plaintext_key = format!("{API_KEY_PREFIX}{project_prefix}{random_part}");
        let key_hash = Self::hash_key(&plaintext_key);

        (plaintext_key, key_hash)
    }

    /// Hash an API key for storage.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Register a new API key.
    pub fn register_key(&self, record: ApiKeyRecord) {
        let mut keys = self.keys.write().expect("api key registry poisoned");
        keys.insert(record.key_hash.clone(), record);
    }

    /// Validate an API key and return its auth context.
    pub fn validate(&self, key: &str) -> Result<AuthContext, AuthError> {
        if !key.starts_with(API_KEY_PREFIX) {
            return Err(AuthError::InvalidApiKey);
        }

        let key_hash = Self::hash_key(key);

        let keys = self.keys.read().expect("api key registry poisoned");
        let record = keys.get(&key_hash).ok_or(AuthError::InvalidApiKey)?;

        if !record.active {
            return Err(AuthError::InvalidApiKey);
        }

        Ok(AuthContext {
            project_ids: record.project_ids.clone(),
            agent_id: record.agent_id,
            permissions: record.permissions.clone(),
        })
    }

    /// Revoke an API key.
    pub fn revoke(&self, key_hash: &str) {
        let mut keys = self.keys.write().expect("api key registry poisoned");
        if let Some(record) = keys.get_mut(key_hash) {
            record.active = false;
        }
    }
}

impl Default for ApiKeyValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        let project_id = Uuid::new_v4();
        let (key, hash) = ApiKeyValidator::generate_key(&project_id);

        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(hash.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_validate_key() {
        let validator = ApiKeyValidator::new();
        let project_id = Uuid::new_v4();

        let (key, hash) = ApiKeyValidator::generate_key(&project_id);

        validator.register_key(ApiKeyRecord {
            key_hash: hash,
            project_ids: vec![project_id],
            permissions: Permissions::read_write(),
            agent_id: None,
            active: true,
        });

        let context = validator.validate(&key).unwrap();
        assert!(context.can_access_project(&project_id));
        assert!(context.can_write());
        assert!(!context.is_admin());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let validator = ApiKeyValidator::new();
        assert!(matches!(
            validator.validate("xl_notregistered"),
            Err(AuthError::InvalidApiKey)
        ));
    }

    #[test]
    fn test_revoked_key_rejected() {
        let validator = ApiKeyValidator::new();
        let project_id = Uuid::new_v4();
        let (key, hash) = ApiKeyValidator::generate_key(&project_id);

        validator.register_key(ApiKeyRecord {
            key_hash: hash.clone(),
            project_ids: vec![],
            permissions: Permissions::admin(),
            agent_id: None,
            active: true,
        });
        validator.revoke(&hash);

        assert!(matches!(
            validator.validate(&key),
            Err(AuthError::InvalidApiKey)
        ));
    }
}
