//! HTTP server bootstrap.
//!
//! Wires together configuration, the database pool, the stores, and the
//! axum router (auth middleware, immutability gate, tracing, CORS).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::api::handlers::health::{health_check, metrics_snapshot, readiness_check};
use crate::auth::{
    auth_middleware, ApiKeyRecord, ApiKeyValidator, AuthMiddlewareState, Authenticator,
    Permissions, RateLimiter,
};
use crate::infra::{
    AgentStore, ComplianceStore, MemoryStore, PgAgentStore, PgComplianceStore, PgMemoryStore,
    PgReceiptStore, PgReplayReader, PgX402RequestStore, ReceiptStore, X402RequestStore,
};
use crate::metrics::MetricsRegistry;
use crate::replay::ReplayService;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Bound on waiting for a pooled connection; keeps request latency
    /// bounded when the store is saturated.
    pub acquire_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/x402_ledger".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let acquire_timeout = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|p| p.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Self {
            database_url,
            listen_addr,
            max_connections,
            acquire_timeout,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<dyn AgentStore>,
    pub requests: Arc<dyn X402RequestStore>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub compliance: Arc<dyn ComplianceStore>,
    pub memories: Arc<dyn MemoryStore>,
    pub replay: Arc<ReplayService>,
    pub metrics: Arc<MetricsRegistry>,
    /// Present when backed by a live database; used by readiness checks.
    pub db_pool: Option<PgPool>,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting x402-ledger v{}", env!("CARGO_PKG_VERSION"));

    // Auth configuration
    let auth_mode = std::env::var("AUTH_MODE").unwrap_or_else(|_| "required".to_string());
    let require_auth = auth_mode != "disabled";

    let api_key_validator = Arc::new(ApiKeyValidator::new());
    let mut any_auth_configured = false;

    if let Ok(bootstrap_key) = std::env::var("BOOTSTRAP_ADMIN_API_KEY") {
        let key_hash = ApiKeyValidator::hash_key(&bootstrap_key);
        api_key_validator.register_key(ApiKeyRecord {
            key_hash,
            project_ids: vec![],
            permissions: Permissions::admin(),
            agent_id: None,
            active: true,
        });
        any_auth_configured = true;
        info!("Bootstrap admin API key is configured");
    }

    if require_auth && !any_auth_configured {
        anyhow::bail!(
            "AUTH_MODE=required but no auth is configured; set BOOTSTRAP_ADMIN_API_KEY (or set AUTH_MODE=disabled for local dev)"
        );
    }

    let rate_limiter = std::env::var("RATE_LIMIT_PER_MINUTE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .map(|rpm| Arc::new(RateLimiter::new(rpm)));

    let auth_state = AuthMiddlewareState {
        authenticator: Arc::new(Authenticator::new(api_key_validator)),
        require_auth,
        rate_limiter,
    };

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);

    // Connect to PostgreSQL
    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    let state = app_state(pool);

    // Build router
    let app = build_router(auth_state, state.metrics.clone()).with_state(state);

    // Start server
    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("x402-ledger is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build application state over a live pool.
pub fn app_state(pool: PgPool) -> AppState {
    AppState {
        agents: Arc::new(PgAgentStore::new(pool.clone())),
        requests: Arc::new(PgX402RequestStore::new(pool.clone())),
        receipts: Arc::new(PgReceiptStore::new(pool.clone())),
        compliance: Arc::new(PgComplianceStore::new(pool.clone())),
        memories: Arc::new(PgMemoryStore::new(pool.clone())),
        replay: Arc::new(ReplayService::new(Arc::new(PgReplayReader::new(
            pool.clone(),
        )))),
        metrics: Arc::new(MetricsRegistry::new()),
        db_pool: Some(pool),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Build the full router: immutability gate first, then auth, then routes.
pub fn build_router(
    auth_state: AuthMiddlewareState,
    metrics: Arc<MetricsRegistry>,
) -> Router<AppState> {
    let api = crate::api::router()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            crate::api::immutability::immutability_gate,
        ));

    let mut router = Router::new()
        .nest("/v1", api)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_snapshot))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env() {
        router = router.layer(cors_layer);
    }

    router
}

fn cors_layer_from_env() -> Option<CorsLayer> {
    let origins = std::env::var("CORS_ALLOW_ORIGINS").ok()?;
    let origins = origins.trim();
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<HeaderValue>().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    )
}

/// Build a dev API key scoped to one project. Used by local tooling.
pub fn dev_api_key(project_id: Uuid) -> (String, ApiKeyRecord) {
    let (key, hash) = ApiKeyValidator::generate_key(&project_id);
    (
        key,
        ApiKeyRecord {
            key_hash: hash,
            project_ids: vec![project_id],
            permissions: Permissions::admin(),
            agent_id: None,
            active: true,
        },
    )
}
