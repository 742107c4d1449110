//! Authentication middleware for axum.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorCode};

use super::{ApiKeyValidator, AuthContext, AuthError, Permissions, API_KEY_PREFIX};

/// Authenticator over the API key registry.
pub struct Authenticator {
    api_key_validator: Arc<ApiKeyValidator>,
}

impl Authenticator {
    pub fn new(api_key_validator: Arc<ApiKeyValidator>) -> Self {
        Self { api_key_validator }
    }

    /// Authenticate a request from its Authorization header.
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthContext, AuthError> {
        let header = auth_header.ok_or(AuthError::MissingAuth)?;

        if let Some(key) = header.strip_prefix("ApiKey ") {
            return self.api_key_validator.validate(key);
        }

        // Raw API key without scheme prefix
        if header.starts_with(API_KEY_PREFIX) {
            return self.api_key_validator.validate(header);
        }

        Err(AuthError::MissingAuth)
    }
}

/// Auth context extension attached to authenticated requests.
#[derive(Clone)]
pub struct AuthContextExt(pub AuthContext);

/// Authentication middleware configuration/state.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub authenticator: Arc<Authenticator>,
    /// If false, requests are treated as fully authorized (dev mode).
    pub require_auth: bool,
    /// Optional global rate limiter.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = match state.authenticator.authenticate(auth_header) {
        Ok(context) => context,
        Err(e) if state.require_auth => return auth_error_response(e),
        Err(_) => AuthContext {
            project_ids: Vec::new(),
            agent_id: None,
            permissions: Permissions::admin(),
        },
    };

    if let Some(ref limiter) = state.rate_limiter {
        let key = context
            .project_ids
            .first()
            .map(|p| format!("project:{p}"))
            .unwrap_or_else(|| "global".to_string());
        if let Err(e) = limiter.check(&key) {
            return auth_error_response(e);
        }
    }

    request.extensions_mut().insert(AuthContextExt(context));
    next.run(request).await
}

fn auth_error_response(error: AuthError) -> Response {
    let api_error = match error {
        AuthError::MissingAuth => ApiError::new(ErrorCode::AuthRequired, "missing authentication"),
        AuthError::InvalidApiKey => ApiError::new(ErrorCode::InvalidApiKey, "invalid API key"),
        AuthError::InsufficientPermissions | AuthError::ProjectAccessDenied => {
            ApiError::new(ErrorCode::InsufficientPermissions, error.to_string())
        }
        AuthError::RateLimited => ApiError::new(ErrorCode::RateLimitExceeded, "rate limit exceeded"),
    };
    api_error.into_response()
}

/// Sliding one-minute rate limiter keyed by project.
pub struct RateLimiter {
    requests_per_minute: u32,
    counts: std::sync::RwLock<std::collections::HashMap<String, (u32, std::time::Instant)>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            counts: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Check if a request is allowed.
    pub fn check(&self, key: &str) -> Result<(), AuthError> {
        let mut counts = self.counts.write().expect("rate limiter poisoned");
        let now = std::time::Instant::now();

        let entry = counts.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1).as_secs() >= 60 {
            *entry = (0, now);
        }

        if entry.0 >= self.requests_per_minute {
            return Err(AuthError::RateLimited);
        }

        entry.0 += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyRecord;
    use uuid::Uuid;

    fn authenticator_with_key() -> (Authenticator, String, Uuid) {
        let validator = Arc::new(ApiKeyValidator::new());
        let project_id = Uuid::new_v4();
        let (key, hash) = ApiKeyValidator::generate_key(&project_id);
        validator.register_key(ApiKeyRecord {
            key_hash: hash,
            project_ids: vec![project_id],
            permissions: Permissions::read_write(),
            agent_id: None,
            active: true,
        });
        (Authenticator::new(validator), key, project_id)
    }

    #[test]
    fn test_authenticate_with_scheme_prefix() {
        let (authenticator, key, project_id) = authenticator_with_key();
        let context = authenticator
            .authenticate(Some(&format!("ApiKey {key}")))
            .unwrap();
        assert!(context.can_access_project(&project_id));
    }

    #[test]
    fn test_authenticate_raw_key() {
        let (authenticator, key, _) = authenticator_with_key();
        assert!(authenticator.authenticate(Some(&key)).is_ok());
    }

    #[test]
    fn test_missing_header_rejected() {
        let (authenticator, _, _) = authenticator_with_key();
        assert!(matches!(
            authenticator.authenticate(None),
            Err(AuthError::MissingAuth)
        ));
    }

    #[test]
    fn test_rate_limiter_caps_requests() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check("p").is_ok());
        assert!(limiter.check("p").is_ok());
        assert!(matches!(limiter.check("p"), Err(AuthError::RateLimited)));
        // Other keys are unaffected.
        assert!(limiter.check("q").is_ok());
    }
}
