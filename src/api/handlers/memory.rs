//! Agent memory handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::{ensure_read, ensure_write};
use crate::auth::AuthContextExt;
use crate::domain::{AgentId, AgentMemory, MemoryType, ProjectId, RunId};
use crate::infra::LedgerError;
use crate::server::AppState;

/// Request body for recording an agent memory.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordMemoryRequest {
    pub agent_id: Uuid,
    pub run_id: Uuid,
    pub memory_type: MemoryType,
    pub content: serde_json::Value,

    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

fn default_namespace() -> String {
    "default".to_string()
}

#[instrument(skip(state, payload), fields(project_id = %project_id, run_id = %payload.run_id))]
pub async fn record_memory(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<RecordMemoryRequest>,
) -> Result<(StatusCode, Json<AgentMemory>), ApiError> {
    ensure_write(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let memory = AgentMemory {
        memory_id: Uuid::new_v4(),
        project_id,
        agent_id: AgentId::from_uuid(payload.agent_id),
        run_id: RunId::from_uuid(payload.run_id),
        memory_type: payload.memory_type,
        content: payload.content,
        metadata: payload.metadata,
        namespace: payload.namespace,
        created_at: Utc::now(),
        seq: 0,
    };

    let stored = state.memories.insert(&memory).await.map_err(ApiError::from)?;

    info!(memory_id = %stored.memory_id, memory_type = %stored.memory_type, "agent memory recorded");

    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state), fields(memory_id = %memory_id))]
pub async fn get_memory(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, memory_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AgentMemory>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let memory = state
        .memories
        .get(project_id, memory_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(LedgerError::MemoryNotFound(memory_id)))?;

    Ok(Json(memory))
}
