//! HTTP-level tests for the router: immutability gate and authentication.
//!
//! These drive the real router with `tower::ServiceExt::oneshot`. The pool
//! is created lazily and never connected — every path exercised here is
//! rejected before any store is touched, so no database is required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use x402_ledger::auth::{ApiKeyValidator, AuthMiddlewareState, Authenticator};
use x402_ledger::server::{app_state, build_router, AppState};

fn test_state() -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/x402_ledger_never_connected")
        .expect("lazy pool");
    app_state(pool)
}

fn router(require_auth: bool) -> axum::Router {
    let state = test_state();
    let auth_state = AuthMiddlewareState {
        authenticator: Arc::new(Authenticator::new(Arc::new(ApiKeyValidator::new()))),
        require_auth,
        rate_limiter: None,
    };
    build_router(auth_state, state.metrics.clone()).with_state(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn mutating_verbs_on_protected_collections_return_immutable_record() {
    let project_id = Uuid::new_v4();
    let record_id = Uuid::new_v4();

    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        for collection in [
            "agents",
            "x402-requests",
            "payment-receipts",
            "compliance-events",
            "agent-memories",
        ] {
            let app = router(false);
            let response = app
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri(format!("/v1/{project_id}/{collection}/{record_id}"))
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(
                response.status(),
                StatusCode::FORBIDDEN,
                "{method} on {collection} must be 403"
            );
            let body = body_json(response).await;
            assert_eq!(body["error_code"], "IMMUTABLE_RECORD");
            assert!(body["detail"].as_str().unwrap().contains("append-only"));
        }
    }
}

#[tokio::test]
async fn gate_rejects_even_unauthenticated_callers() {
    // Immutability wins over authentication: the 403 comes back without
    // credentials ever being checked.
    let app = router(true);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/v1/{}/x402-requests/{}", Uuid::new_v4(), Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "IMMUTABLE_RECORD");
}

#[tokio::test]
async fn reads_require_credentials_when_auth_is_on() {
    let app = router(true);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(format!("/v1/{}/agents", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let app = router(true);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(format!("/v1/{}/agents", Uuid::new_v4()))
                .header(header::AUTHORIZATION, "ApiKey xl_unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn health_is_open() {
    let app = router(true);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "x402-ledger");
}
