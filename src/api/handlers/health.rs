//! Liveness, readiness, and debugging endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "x402-ledger",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint. Verifies database connectivity.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match &state.db_pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => Ok(Json(serde_json::json!({
                "status": "ready",
                "database": "connected",
            }))),
            Err(e) => Err((
                StatusCode::SERVICE_UNAVAILABLE,
                format!("database unavailable: {e}"),
            )),
        },
        None => Ok(Json(serde_json::json!({
            "status": "ready",
            "database": "not configured",
        }))),
    }
}

/// Counter snapshot for debugging.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "uptime_secs": state.metrics.uptime_secs(),
        "counters": state.metrics.snapshot(),
    }))
}
