//! Compliance event handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::handlers::{ensure_read, ensure_write};
use crate::auth::AuthContextExt;
use crate::domain::{
    AgentId, ComplianceEvent, ComplianceEventType, ComplianceOutcome, ProjectId, RunId,
};
use crate::infra::LedgerError;
use crate::server::AppState;

/// Request body for recording a compliance event.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordComplianceEventRequest {
    pub agent_id: Uuid,
    pub event_type: ComplianceEventType,
    pub outcome: ComplianceOutcome,
    pub risk_score: f64,

    #[serde(default = "empty_object")]
    pub details: serde_json::Value,

    pub run_id: Uuid,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[instrument(skip(state, payload), fields(project_id = %project_id, run_id = %payload.run_id))]
pub async fn record_event(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<RecordComplianceEventRequest>,
) -> Result<(StatusCode, Json<ComplianceEvent>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    if !ComplianceEvent::valid_risk_score(payload.risk_score) {
        return Err(ApiError::new(
            ErrorCode::ValidationFailed,
            format!("risk_score must be within [0.0, 1.0], got {}", payload.risk_score),
        ));
    }

    let event = ComplianceEvent {
        event_id: Uuid::new_v4(),
        project_id,
        agent_id: AgentId::from_uuid(payload.agent_id),
        event_type: payload.event_type,
        outcome: payload.outcome,
        risk_score: payload.risk_score,
        details: payload.details,
        run_id: RunId::from_uuid(payload.run_id),
        created_at: Utc::now(),
        seq: 0,
    };

    let stored = state
        .compliance
        .insert(&event)
        .await
        .map_err(ApiError::from)?;

    info!(
        event_id = %stored.event_id,
        event_type = %stored.event_type,
        outcome = %stored.outcome,
        "compliance event recorded"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state), fields(event_id = %event_id))]
pub async fn get_event(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, event_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ComplianceEvent>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let event = state
        .compliance
        .get(project_id, event_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(LedgerError::ComplianceEventNotFound(event_id)))?;

    Ok(Json(event))
}
