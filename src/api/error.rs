//! Structured API error responses with stable error codes.
//!
//! Every error leaving the service has the shape
//! `{detail: string, error_code: string}` so callers can branch
//! deterministically on `error_code` and log `detail`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::crypto::SignatureError;
use crate::infra::LedgerError;

/// Stable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication
    /// No credentials provided
    AuthRequired,
    /// Invalid API key
    InvalidApiKey,
    /// Credential lacks the needed permission
    InsufficientPermissions,
    /// Rate limit exceeded
    RateLimitExceeded,

    // Signature
    /// DID failed the recognized-scheme/length checks
    InvalidDidFormat,
    /// Signature did not verify against the DID's key material
    SignatureVerificationFailed,

    // Conflicts
    /// Idempotency key reused with a different payload
    IdempotencyKeyConflict,
    /// Settlement attempted against a request that is not APPROVED/COMPLETED
    RequestNotAuthorized,
    /// The targeted chain row already has a successor
    RecordSuperseded,
    /// DID already registered to another agent
    DidAlreadyRegistered,

    // Immutability
    /// Overwrite or delete attempted on an append-only collection
    ImmutableRecord,

    // Resources
    AgentNotFound,
    RequestNotFound,
    ReceiptNotFound,
    ComplianceEventNotFound,
    MemoryNotFound,
    ResourceNotFound,

    // State
    /// Illegal lifecycle transition
    InvalidStateTransition,
    /// Request body failed validation
    ValidationFailed,
    /// Supersede-chain corruption detected
    ReplayIntegrityError,

    // Infrastructure
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this error code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::AuthRequired | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,

            // Signature failures reject the write outright.
            Self::InvalidDidFormat | Self::SignatureVerificationFailed => StatusCode::UNAUTHORIZED,

            Self::IdempotencyKeyConflict
            | Self::RequestNotAuthorized
            | Self::RecordSuperseded
            | Self::DidAlreadyRegistered => StatusCode::CONFLICT,

            Self::ImmutableRecord => StatusCode::FORBIDDEN,

            Self::AgentNotFound
            | Self::RequestNotFound
            | Self::ReceiptNotFound
            | Self::ComplianceEventNotFound
            | Self::MemoryNotFound
            | Self::ResourceNotFound => StatusCode::NOT_FOUND,

            Self::InvalidStateTransition | Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::ReplayIntegrityError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::DatabaseError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::InvalidDidFormat => "INVALID_DID_FORMAT",
            Self::SignatureVerificationFailed => "SIGNATURE_VERIFICATION_FAILED",
            Self::IdempotencyKeyConflict => "IDEMPOTENCY_KEY_CONFLICT",
            Self::RequestNotAuthorized => "REQUEST_NOT_AUTHORIZED",
            Self::RecordSuperseded => "RECORD_SUPERSEDED",
            Self::DidAlreadyRegistered => "DID_ALREADY_REGISTERED",
            Self::ImmutableRecord => "IMMUTABLE_RECORD",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::RequestNotFound => "REQUEST_NOT_FOUND",
            Self::ReceiptNotFound => "RECEIPT_NOT_FOUND",
            Self::ComplianceEventNotFound => "COMPLIANCE_EVENT_NOT_FOUND",
            Self::MemoryNotFound => "MEMORY_NOT_FOUND",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::ReplayIntegrityError => "REPLAY_INTEGRITY_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

/// Wire error body: `{detail, error_code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message
    pub detail: String,

    /// Machine-readable stable code
    pub error_code: ErrorCode,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            error_code,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.error_code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error_code.to_string();
        let mut response = (status, Json(self)).into_response();

        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(e) => {
                Self::new(ErrorCode::DatabaseError, format!("database error: {e}"))
            }
            LedgerError::Signature(e) => match e {
                SignatureError::InvalidDid(d) => {
                    Self::new(ErrorCode::InvalidDidFormat, d.to_string())
                }
                other => Self::new(ErrorCode::SignatureVerificationFailed, other.to_string()),
            },
            LedgerError::AgentNotFound(id) => {
                Self::new(ErrorCode::AgentNotFound, format!("agent not found: {id}"))
            }
            LedgerError::RequestNotFound(id) => Self::new(
                ErrorCode::RequestNotFound,
                format!("x402 request not found: {id}"),
            ),
            LedgerError::ReceiptNotFound(id) => Self::new(
                ErrorCode::ReceiptNotFound,
                format!("payment receipt not found: {id}"),
            ),
            LedgerError::ComplianceEventNotFound(id) => Self::new(
                ErrorCode::ComplianceEventNotFound,
                format!("compliance event not found: {id}"),
            ),
            LedgerError::MemoryNotFound(id) => Self::new(
                ErrorCode::MemoryNotFound,
                format!("agent memory not found: {id}"),
            ),
            LedgerError::DidAlreadyRegistered(did) => Self::new(
                ErrorCode::DidAlreadyRegistered,
                format!("DID already registered: {did}"),
            ),
            LedgerError::IdempotencyConflict { idempotency_key } => Self::new(
                ErrorCode::IdempotencyKeyConflict,
                format!("idempotency key {idempotency_key:?} was already used with a different payload"),
            ),
            LedgerError::ImmutableRecord { collection } => Self::new(
                ErrorCode::ImmutableRecord,
                format!("{collection} records are append-only and cannot be modified or deleted"),
            ),
            LedgerError::InvalidStateTransition { record_id, from, to } => Self::new(
                ErrorCode::InvalidStateTransition,
                format!("invalid state transition for {record_id}: {from} -> {to}"),
            ),
            LedgerError::RequestNotAuthorized { request_id, status } => Self::new(
                ErrorCode::RequestNotAuthorized,
                format!(
                    "request {request_id} has effective status {status}, settlement requires APPROVED or COMPLETED"
                ),
            ),
            LedgerError::AlreadySuperseded { record_id } => Self::new(
                ErrorCode::RecordSuperseded,
                format!("record {record_id} was already superseded"),
            ),
            LedgerError::ChainIntegrity(e) => {
                Self::new(ErrorCode::ReplayIntegrityError, e.to_string())
            }
            LedgerError::Validation(msg) => Self::new(ErrorCode::ValidationFailed, msg),
            LedgerError::Internal(msg) => Self::new(ErrorCode::InternalError, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let error = ApiError::new(ErrorCode::ImmutableRecord, "x402_requests records are append-only");
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["error_code"], "IMMUTABLE_RECORD");
        assert!(json["detail"].as_str().unwrap().contains("append-only"));
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ErrorCode::SignatureVerificationFailed.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::InvalidDidFormat.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::IdempotencyKeyConflict.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ErrorCode::ImmutableRecord.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::RequestNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InvalidStateTransition.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_ledger_error_conversion() {
        let api: ApiError = LedgerError::IdempotencyConflict {
            idempotency_key: "k-1".to_string(),
        }
        .into();
        assert_eq!(api.error_code, ErrorCode::IdempotencyKeyConflict);

        let api: ApiError = LedgerError::Signature(SignatureError::VerificationFailed).into();
        assert_eq!(api.error_code, ErrorCode::SignatureVerificationFailed);

        let api: ApiError =
            LedgerError::Signature(crate::crypto::DidError::TooShort.into()).into();
        assert_eq!(api.error_code, ErrorCode::InvalidDidFormat);
    }
}
