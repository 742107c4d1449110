//! Append-only enforcement at the HTTP boundary.
//!
//! Intercepts every request before routing. `PUT`, `PATCH`, and `DELETE`
//! against any protected collection are rejected with `403 IMMUTABLE_RECORD`
//! regardless of caller identity or payload. Without this layer a mutating
//! verb on a known path would surface as a routing 405 instead of the
//! contract's immutability error. The storage triggers provide the second,
//! independent layer of the same guarantee.

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::metrics::MetricsRegistry;

use super::error::{ApiError, ErrorCode};

/// The five append-only collections.
pub const PROTECTED_COLLECTIONS: [&str; 5] = [
    "agents",
    "x402-requests",
    "payment-receipts",
    "compliance-events",
    "agent-memories",
];

/// Find the protected collection a path touches, if any.
pub fn protected_collection(path: &str) -> Option<&'static str> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .find_map(|segment| {
            PROTECTED_COLLECTIONS
                .iter()
                .find(|c| **c == segment)
                .copied()
        })
}

/// Whether the method/path combination must be rejected.
pub fn is_forbidden_write(method: &Method, path: &str) -> Option<&'static str> {
    if matches!(*method, Method::PUT | Method::PATCH | Method::DELETE) {
        protected_collection(path)
    } else {
        None
    }
}

/// Immutability gate middleware.
pub async fn immutability_gate(
    State(metrics): State<Arc<MetricsRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(collection) = is_forbidden_write(request.method(), request.uri().path()) {
        metrics.incr("immutable_rejections");
        return ApiError::new(
            ErrorCode::ImmutableRecord,
            format!("{collection} records are append-only and cannot be modified or deleted"),
        )
        .into_response();
    }

    next.run(request).await
}
