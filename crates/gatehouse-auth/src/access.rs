//! Shared authorization decision
//!
//! Both enforcement points (edge middleware and per-handler extractors)
//! call through here, so the role check cannot drift between them.

use gatehouse_db::Role;

use crate::error::AuthError;

/// Roles allowed into the admin area
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// Check a role against an allowed set
pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole)
    }
}
