//! Agent registration and lookup handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::{ensure_admin, ensure_read};
use crate::auth::AuthContextExt;
use crate::crypto::{parse_did_key, SignatureError};
use crate::domain::{Agent, AgentId, AgentScope, ProjectId};
use crate::infra::LedgerError;
use crate::server::AppState;

/// Request body for registering an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgentRequest {
    /// `did:key` identifier carrying the agent's Ed25519 public key
    pub did: String,

    pub role: String,
    pub display_name: String,

    #[serde(default = "default_scope")]
    pub scope: AgentScope,
}

fn default_scope() -> AgentScope {
    AgentScope::Project
}

#[instrument(skip(state, payload), fields(project_id = %project_id))]
pub async fn register_agent(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    ensure_admin(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    // The DID must be well-formed before it can anchor any signature.
    parse_did_key(&payload.did)
        .map_err(|e| ApiError::from(LedgerError::Signature(SignatureError::InvalidDid(e))))?;

    let agent = Agent {
        agent_id: AgentId::new(),
        project_id,
        did: payload.did,
        role: payload.role,
        display_name: payload.display_name,
        scope: payload.scope,
        created_at: Utc::now(),
        seq: 0,
    };

    let stored = state.agents.insert(&agent).await.map_err(ApiError::from)?;

    info!(agent_id = %stored.agent_id, did = %stored.did, "agent registered");

    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state), fields(agent_id = %agent_id))]
pub async fn get_agent(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, agent_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Agent>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let agent = state
        .agents
        .get(project_id, agent_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(LedgerError::AgentNotFound(agent_id)))?;

    Ok(Json(agent))
}

#[instrument(skip(state))]
pub async fn list_agents(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);

    let agents = state.agents.list(project_id).await.map_err(ApiError::from)?;
    Ok(Json(agents))
}
