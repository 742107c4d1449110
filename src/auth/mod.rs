//! Authentication and authorization.
//!
//! Session authentication is an upstream concern; this module is the gate
//! the ledger itself carries: SHA-256-hashed API keys scoped to projects,
//! applied as axum middleware before any handler runs.
//!
//! # Configuration
//!
//! - `AUTH_MODE`: `required` (default) or `disabled` for development
//! - `BOOTSTRAP_ADMIN_API_KEY`: initial admin key for setup
//! - `RATE_LIMIT_PER_MINUTE`: optional per-project rate limit

mod api_key;
mod middleware;

pub use api_key::*;
pub use middleware::*;

use uuid::Uuid;

/// Authentication context extracted from a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Projects this credential can access (empty = all projects)
    pub project_ids: Vec<Uuid>,

    /// Agent ID for agent-specific keys
    pub agent_id: Option<Uuid>,

    /// Allowed operations
    pub permissions: Permissions,
}

/// Permission flags for operations.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    /// Can read ledgers and replays
    pub read: bool,

    /// Can append new records
    pub write: bool,

    /// Can register agents and manage keys
    pub admin: bool,
}

impl Permissions {
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            admin: false,
        }
    }

    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            read: true,
            write: true,
            admin: true,
        }
    }
}

impl AuthContext {
    /// Whether this credential can touch the given project.
    pub fn can_access_project(&self, project_id: &Uuid) -> bool {
        self.project_ids.is_empty() || self.project_ids.contains(project_id)
    }

    pub fn can_read(&self) -> bool {
        self.permissions.read
    }

    pub fn can_write(&self) -> bool {
        self.permissions.write
    }

    pub fn is_admin(&self) -> bool {
        self.permissions.admin
    }
}

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication")]
    MissingAuth,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("insufficient permissions")]
    InsufficientPermissions,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("project access denied")]
    ProjectAccessDenied,
}
