//! Payment-authorization request handlers.
//!
//! # Endpoints
//!
//! - `POST /v1/:project_id/x402-requests` - submit a signed request
//! - `GET  /v1/:project_id/x402-requests/:request_id` - effective record
//! - `POST /v1/:project_id/x402-requests/:request_id/transitions` - new status
//! - `POST /v1/:project_id/x402-requests/:request_id/links` - new links
//!
//! # Flow
//!
//! 1. Agent signs the canonical payload and submits the request
//! 2. The signature is verified against the agent's DID (401 on failure)
//! 3. The idempotency key dedups concurrent retries at the store constraint
//! 4. Lifecycle progress and link additions insert chained successor rows;
//!    the effective record is resolved by walking the chain at read time

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::handlers::{ensure_read, ensure_write};
use crate::auth::AuthContextExt;
use crate::crypto::{payload_hash, verify_request_signature};
use crate::domain::{
    ts_millis, AgentId, AgentMemory, ComplianceEvent, ProjectId, RequestStatus, RunId, TaskId,
    X402Request,
};
use crate::infra::{resolve_idempotent, LedgerError};
use crate::server::AppState;

// =============================================================================
// Submit Request
// =============================================================================

/// Request body for submitting a payment-authorization request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitX402Request {
    pub agent_id: Uuid,
    pub task_id: Uuid,
    pub run_id: Uuid,

    /// Opaque payload the agent signed
    pub request_payload: serde_json::Value,

    /// Ed25519 signature over the canonical payload (0x-hex)
    pub signature: String,

    pub idempotency_key: Option<String>,

    /// Caller-declared initial status; defaults to PENDING
    pub status: Option<RequestStatus>,
}

/// Response after submitting a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitX402Response {
    pub request_id: Uuid,
    pub status: RequestStatus,

    #[serde(with = "ts_millis")]
    pub timestamp: DateTime<Utc>,

    pub linked_memory_ids: Vec<Uuid>,
    pub linked_compliance_ids: Vec<Uuid>,
}

impl From<&X402Request> for SubmitX402Response {
    fn from(r: &X402Request) -> Self {
        Self {
            request_id: r.request_id,
            status: r.status,
            timestamp: r.created_at,
            linked_memory_ids: r.linked_memory_ids.clone(),
            linked_compliance_ids: r.linked_compliance_ids.clone(),
        }
    }
}

#[instrument(skip(state, payload), fields(project_id = %project_id, agent_id = %payload.agent_id))]
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<SubmitX402Request>,
) -> Result<(StatusCode, Json<SubmitX402Response>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let agent = state
        .agents
        .get(project_id, payload.agent_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::AgentNotFound,
                format!("agent not found: {}", payload.agent_id),
            )
        })?;

    // Authenticity first: the signature must verify against the submitting
    // agent's DID before anything is persisted.
    if let Err(e) =
        verify_request_signature(&agent.did, &payload.signature, &payload.request_payload)
    {
        state.metrics.incr("signature_failures");
        warn!(error = %e, did = %agent.did, "signature verification failed");
        return Err(ApiError::from(LedgerError::Signature(e)));
    }

    let fingerprint = payload_hash(&payload.request_payload)
        .map_err(|e| ApiError::new(ErrorCode::ValidationFailed, e.to_string()))?;

    let request = X402Request {
        request_id: Uuid::new_v4(),
        project_id,
        agent_id: AgentId::from_uuid(payload.agent_id),
        task_id: TaskId::from_uuid(payload.task_id),
        run_id: RunId::from_uuid(payload.run_id),
        request_payload: payload.request_payload,
        payload_hash: fingerprint,
        signature: payload.signature,
        signature_verified: true,
        status: payload.status.unwrap_or(RequestStatus::Pending),
        linked_memory_ids: vec![],
        linked_compliance_ids: vec![],
        supersedes: None,
        idempotency_key: payload.idempotency_key.clone(),
        created_at: Utc::now(),
        seq: 0,
    };

    let stored = match payload.idempotency_key.as_deref() {
        Some(key) => {
            let resolution = resolve_idempotent(
                key,
                fingerprint,
                |winner: &X402Request| Ok(winner.payload_hash),
                || state.requests.insert_root(&request),
                || state.requests.get_by_idempotency_key(project_id, key),
            )
            .await
            .map_err(ApiError::from)?;

            if resolution.was_created() {
                state.metrics.incr("requests_created");
            } else {
                state.metrics.incr("requests_replayed");
                debug!(idempotency_key = %key, "returning existing request for idempotency key");
            }
            resolution.into_inner()
        }
        None => {
            let stored = state
                .requests
                .insert_root(&request)
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| {
                    ApiError::new(ErrorCode::InternalError, "insert returned no row")
                })?;
            state.metrics.incr("requests_created");
            stored
        }
    };

    info!(request_id = %stored.request_id, status = %stored.status, "x402 request recorded");

    Ok((StatusCode::CREATED, Json(SubmitX402Response::from(&stored))))
}

// =============================================================================
// Get Effective Record
// =============================================================================

/// Effective record plus denormalized linked audit rows.
#[derive(Debug, Clone, Serialize)]
pub struct X402RequestView {
    #[serde(flatten)]
    pub record: X402Request,

    pub linked_memories: Vec<AgentMemory>,
    pub linked_compliance_events: Vec<ComplianceEvent>,
}

#[instrument(skip(state), fields(request_id = %request_id))]
pub async fn get_request(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, request_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<X402RequestView>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let effective = state
        .requests
        .resolve_effective(project_id, request_id)
        .await
        .map_err(ApiError::from)?;

    let linked_memories = state
        .memories
        .get_many(project_id, &effective.linked_memory_ids)
        .await
        .map_err(ApiError::from)?;
    let linked_compliance_events = state
        .compliance
        .get_many(project_id, &effective.linked_compliance_ids)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(X402RequestView {
        record: effective,
        linked_memories,
        linked_compliance_events,
    }))
}

// =============================================================================
// Transition
// =============================================================================

/// Request body for a status transition.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: RequestStatus,
}

#[instrument(skip(state), fields(request_id = %request_id, new_status = %payload.status))]
pub async fn transition_request(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, request_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<TransitionRequest>,
) -> Result<(StatusCode, Json<SubmitX402Response>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let tip = state
        .requests
        .resolve_effective(project_id, request_id)
        .await
        .map_err(ApiError::from)?;

    if !tip.status.can_transition(payload.status) {
        return Err(ApiError::from(LedgerError::InvalidStateTransition {
            record_id: tip.request_id,
            from: tip.status.to_string(),
            to: payload.status.to_string(),
        }));
    }

    let successor = tip.successor_with_status(payload.status, Utc::now());
    let stored = state
        .requests
        .insert_successor(&successor)
        .await
        .map_err(ApiError::from)?;

    info!(
        predecessor = %tip.request_id,
        successor = %stored.request_id,
        status = %stored.status,
        "x402 request transitioned"
    );

    Ok((StatusCode::CREATED, Json(SubmitX402Response::from(&stored))))
}

// =============================================================================
// Link
// =============================================================================

/// Request body for establishing links.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    pub memory_ids: Vec<Uuid>,

    #[serde(default)]
    pub compliance_ids: Vec<Uuid>,
}

#[instrument(skip(state, payload), fields(request_id = %request_id))]
pub async fn link_request(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, request_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<LinkRequest>,
) -> Result<(StatusCode, Json<SubmitX402Response>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    if payload.memory_ids.is_empty() && payload.compliance_ids.is_empty() {
        return Err(ApiError::new(
            ErrorCode::ValidationFailed,
            "at least one memory_id or compliance_id is required",
        ));
    }

    let tip = state
        .requests
        .resolve_effective(project_id, request_id)
        .await
        .map_err(ApiError::from)?;

    let successor =
        tip.successor_with_links(&payload.memory_ids, &payload.compliance_ids, Utc::now());
    let stored = state
        .requests
        .insert_successor(&successor)
        .await
        .map_err(ApiError::from)?;

    info!(
        predecessor = %tip.request_id,
        successor = %stored.request_id,
        "x402 request links extended"
    );

    Ok((StatusCode::CREATED, Json(SubmitX402Response::from(&stored))))
}
