//! Gatehouse REST API
//!
//! This crate provides the Axum-based HTTP surface: the sign-in
//! endpoints, the session-status projection, and the role-gated admin
//! user management routes.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
