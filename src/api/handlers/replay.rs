//! Run replay handler.

use axum::extract::{Extension, Path, State};
use axum::Json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::ensure_read;
use crate::auth::AuthContextExt;
use crate::domain::{ProjectId, RunId, RunReplay};
use crate::server::AppState;

#[instrument(skip(state), fields(run_id = %run_id))]
pub async fn replay_run(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path((project_id, run_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RunReplay>, ApiError> {
    ensure_read(&auth, project_id)?;
    let project_id = ProjectId::from_uuid(project_id);
    let run_id = RunId::from_uuid(run_id);

    let replay = state
        .replay
        .replay(project_id, run_id)
        .await
        .map_err(ApiError::from)?;

    state.metrics.incr("replays_served");
    info!(
        timeline_len = replay.timeline.len(),
        integrity_errors = replay.validation.integrity_errors.len(),
        "run replay assembled"
    );

    Ok(Json(replay))
}
