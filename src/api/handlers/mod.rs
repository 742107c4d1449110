//! HTTP handlers for the ledger API.

pub mod agents;
pub mod compliance;
pub mod health;
pub mod memory;
pub mod receipts;
pub mod replay;
pub mod x402_requests;

use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::auth::AuthContext;

/// Require read access to a project.
pub fn ensure_read(auth: &AuthContext, project_id: Uuid) -> Result<(), ApiError> {
    if !auth.can_read() || !auth.can_access_project(&project_id) {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            format!("read access to project {project_id} denied"),
        ));
    }
    Ok(())
}

/// Require write access to a project.
pub fn ensure_write(auth: &AuthContext, project_id: Uuid) -> Result<(), ApiError> {
    if !auth.can_write() || !auth.can_access_project(&project_id) {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            format!("write access to project {project_id} denied"),
        ));
    }
    Ok(())
}

/// Require admin access to a project.
pub fn ensure_admin(auth: &AuthContext, project_id: Uuid) -> Result<(), ApiError> {
    if !auth.is_admin() || !auth.can_access_project(&project_id) {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            format!("admin access to project {project_id} denied"),
        ));
    }
    Ok(())
}
