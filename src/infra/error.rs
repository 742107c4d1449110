//! Error types for the ledger service.

use thiserror::Error;
use uuid::Uuid;

use crate::crypto::SignatureError;
use crate::domain::ChainError;

/// Errors that can occur in the ledger service.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// DID/signature failure on a write
    #[error("{0}")]
    Signature(#[from] SignatureError),

    /// Agent not found
    #[error("agent not found: {0}")]
    AgentNotFound(Uuid),

    /// Payment-authorization request not found
    #[error("x402 request not found: {0}")]
    RequestNotFound(Uuid),

    /// Payment receipt not found
    #[error("payment receipt not found: {0}")]
    ReceiptNotFound(Uuid),

    /// Compliance event not found
    #[error("compliance event not found: {0}")]
    ComplianceEventNotFound(Uuid),

    /// Agent memory not found
    #[error("agent memory not found: {0}")]
    MemoryNotFound(Uuid),

    /// DID already registered to another agent
    #[error("DID already registered: {0}")]
    DidAlreadyRegistered(String),

    /// Idempotency key reused with a different payload
    #[error("idempotency key {idempotency_key:?} was already used with a different payload")]
    IdempotencyConflict { idempotency_key: String },

    /// Attempted overwrite or delete of a committed row
    #[error("{collection} records are immutable")]
    ImmutableRecord { collection: String },

    /// Illegal lifecycle transition
    #[error("invalid state transition for {record_id}: {from} -> {to}")]
    InvalidStateTransition {
        record_id: Uuid,
        from: String,
        to: String,
    },

    /// Settlement attempted against a request that is not authorized
    #[error("request {request_id} has effective status {status}, settlement requires APPROVED or COMPLETED")]
    RequestNotAuthorized { request_id: Uuid, status: String },

    /// Successor insert lost the race: the predecessor already has one
    #[error("record {record_id} was already superseded")]
    AlreadySuperseded { record_id: Uuid },

    /// Supersede-chain corruption detected during resolution
    #[error("replay integrity error: {0}")]
    ChainIntegrity(#[from] ChainError),

    /// Request body failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        // The storage-level append-only triggers raise with a recognizable
        // token; surface those as immutability violations, not as opaque
        // database failures.
        if let Some(db) = e.as_database_error() {
            if db.message().contains("IMMUTABLE_RECORD") {
                return Self::ImmutableRecord {
                    collection: "ledger".to_string(),
                };
            }
        }
        Self::Database(e)
    }
}

/// Whether a sqlx error is a unique-constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
