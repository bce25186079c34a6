//! Gatehouse Authentication and Authorization
//!
//! This crate provides the credential login flow, the in-memory
//! brute-force rate limiter, JWT session issuance, and role-based
//! access control for the admin area.

pub mod access;
pub mod authenticator;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod token;

pub use access::{authorize, ADMIN_ROLES};
pub use authenticator::{AuthenticatedUser, Authenticator, BypassCredential};
pub use cookie::{
    clear_session_cookie, extract_session_token, session_cookie, CookieSettings,
    SESSION_COOKIE_NAME,
};
pub use error::AuthError;
pub use middleware::{edge_guard, EdgeGuard, GuardConfig};
pub use password::{hash_password, verify_password};
pub use rate_limit::{LockStatus, RateLimitKey, RateLimiter, RateLimiterConfig};
pub use token::{SessionClaims, SessionManager};
