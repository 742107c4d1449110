//! REST API: routers, wire errors, and the immutability gate.

pub mod error;
pub mod handlers;
pub mod immutability;

use axum::routing::{get, post};
use axum::Router;

use crate::server::AppState;

/// Build the `/v1` router.
///
/// Transitions and links are POST routes because they create successor rows;
/// there are deliberately no PUT/PATCH/DELETE routes anywhere; the
/// immutability gate rejects those verbs before routing.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:project_id/agents", post(handlers::agents::register_agent))
        .route("/:project_id/agents", get(handlers::agents::list_agents))
        .route("/:project_id/agents/:agent_id", get(handlers::agents::get_agent))
        .route(
            "/:project_id/x402-requests",
            post(handlers::x402_requests::submit_request),
        )
        .route(
            "/:project_id/x402-requests/:request_id",
            get(handlers::x402_requests::get_request),
        )
        .route(
            "/:project_id/x402-requests/:request_id/transitions",
            post(handlers::x402_requests::transition_request),
        )
        .route(
            "/:project_id/x402-requests/:request_id/links",
            post(handlers::x402_requests::link_request),
        )
        .route(
            "/:project_id/payment-receipts",
            post(handlers::receipts::create_receipt),
        )
        .route(
            "/:project_id/payment-receipts/:receipt_id",
            get(handlers::receipts::get_receipt),
        )
        .route(
            "/:project_id/payment-receipts/:receipt_id/transitions",
            post(handlers::receipts::transition_receipt),
        )
        .route(
            "/:project_id/compliance-events",
            post(handlers::compliance::record_event),
        )
        .route(
            "/:project_id/compliance-events/:event_id",
            get(handlers::compliance::get_event),
        )
        .route(
            "/:project_id/agent-memories",
            post(handlers::memory::record_memory),
        )
        .route(
            "/:project_id/agent-memories/:memory_id",
            get(handlers::memory::get_memory),
        )
        .route(
            "/:project_id/runs/:run_id/replay",
            get(handlers::replay::replay_run),
        )
}
