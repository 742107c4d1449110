//! Settlement receipt handlers.
//!
//! A receipt can only be opened against a request whose effective status is
//! APPROVED or COMPLETED; the idempotency key guarantees at-most-one receipt
//! per (project, key) under concurrent retries.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::handlers::{ensure_read, ensure_write};
use crate::auth::AuthContextExt;
use crate::crypto::{payload_hash, Hash256};
use crate::domain::{Amount, AgentId, PaymentReceipt, ProjectId, ReceiptStatus};
use crate::infra::{resolve_idempotent, LedgerError, Result as LedgerResult};
use crate::server::AppState;

// =============================================================================
// Initiate Transfer
// =============================================================================

/// Request body for initiating a tracked transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReceiptRequest {
    pub x402_request_id: Uuid,
    pub from_agent_id: Uuid,
    pub to_agent_id: Uuid,

    /// Fixed-precision decimal string, e.g. "1.500000"
    pub amount: String,

    pub treasury_source: String,
    pub treasury_destination: String,
    pub idempotency_key: String,
}

/// Canonical fingerprint of a receipt's logical inputs.
///
/// Two creations with the same idempotency key are "the same logical
/// request" exactly when these inputs match; the winner's fingerprint is
/// recomputed from its stored fields, so no extra column is needed.
fn receipt_fingerprint(receipt: &PaymentReceipt) -> LedgerResult<Hash256> {
    payload_hash(&json!({
        "x402_request_id": receipt.x402_request_id,
        "from_agent_id": receipt.from_agent_id.0,
        "to_agent_id": receipt.to_agent_id.0,
        "amount": receipt.amount.as_str(),
        "treasury_source": receipt.treasury_source,
        "treasury_destination": receipt.treasury_destination,
    }))
    .map_err(|e| LedgerError::Internal(e.to_string()))
}

#[instrument(skip(state, payload), fields(project_id = %project_id, request_id = %payload.x402_request_id))]
pub async fn create_receipt(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateReceiptRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let amount = Amount::parse(payload.amount)
        .map_err(|e| ApiError::new(ErrorCode::ValidationFailed, e.to_string()))?;

    // Precondition: the referenced request must chain-resolve to an
    // authorized status before any settlement is tracked against it.
    let effective = state
        .requests
        .resolve_effective(project_id, payload.x402_request_id)
        .await
        .map_err(ApiError::from)?;
    if !effective.status.is_authorized() {
        return Err(ApiError::from(LedgerError::RequestNotAuthorized {
            request_id: payload.x402_request_id,
            status: effective.status.to_string(),
        }));
    }

    let receipt = PaymentReceipt {
        receipt_id: Uuid::new_v4(),
        project_id,
        x402_request_id: payload.x402_request_id,
        from_agent_id: AgentId::from_uuid(payload.from_agent_id),
        to_agent_id: AgentId::from_uuid(payload.to_agent_id),
        amount,
        status: ReceiptStatus::Pending,
        transaction_hash: None,
        treasury_source: payload.treasury_source,
        treasury_destination: payload.treasury_destination,
        idempotency_key: payload.idempotency_key.clone(),
        supersedes: None,
        created_at: Utc::now(),
        confirmed_at: None,
        seq: 0,
    };

    let fingerprint = receipt_fingerprint(&receipt).map_err(ApiError::from)?;
    let key = payload.idempotency_key.as_str();

    let resolution = resolve_idempotent(
        key,
        fingerprint,
        receipt_fingerprint,
        || state.receipts.insert_root(&receipt),
        || state.receipts.get_by_idempotency_key(project_id, key),
    )
    .await
    .map_err(ApiError::from)?;

    if resolution.was_created() {
        state.metrics.incr("receipts_created");
    } else {
        state.metrics.incr("receipts_replayed");
        debug!(idempotency_key = %key, "returning existing receipt for idempotency key");
    }
    let stored = resolution.into_inner();

    info!(receipt_id = %stored.receipt_id, amount = %stored.amount, "payment receipt recorded");

    Ok((StatusCode::CREATED, Json(stored)))
}

// =============================================================================
// Get Effective Receipt
// =============================================================================

#[instrument(skip(state), fields(receipt_id = %receipt_id))]
pub async fn get_receipt(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, receipt_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PaymentReceipt>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let effective = state
        .receipts
        .resolve_effective(project_id, receipt_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(effective))
}

// =============================================================================
// Transition
// =============================================================================

/// Request body for a settlement status change.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptTransitionRequest {
    pub status: ReceiptStatus,

    /// Settlement transaction hash from the custody provider
    pub transaction_hash: Option<String>,
}

#[instrument(skip(state), fields(receipt_id = %receipt_id, new_status = %payload.status))]
pub async fn transition_receipt(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, receipt_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReceiptTransitionRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let tip = state
        .receipts
        .resolve_effective(project_id, receipt_id)
        .await
        .map_err(ApiError::from)?;

    if !tip.status.can_transition(payload.status) {
        return Err(ApiError::from(LedgerError::InvalidStateTransition {
            record_id: tip.receipt_id,
            from: tip.status.to_string(),
            to: payload.status.to_string(),
        }));
    }

    let successor =
        tip.successor_with_status(payload.status, payload.transaction_hash, Utc::now());
    let stored = state
        .receipts
        .insert_successor(&successor)
        .await
        .map_err(ApiError::from)?;

    info!(
        predecessor = %tip.receipt_id,
        successor = %stored.receipt_id,
        status = %stored.status,
        "payment receipt transitioned"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}
