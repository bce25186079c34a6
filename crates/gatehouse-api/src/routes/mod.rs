//! API routes

mod auth;
mod health;
mod types;
mod users;

use axum::Router;
use gatehouse_auth::{edge_guard, EdgeGuard};

use crate::state::AppState;

pub use auth::{RequireAdmin, RequireSession};

/// Create the main router
///
/// The edge guard wraps every route; the protected handlers additionally
/// re-check the session through the extractors (defense in depth).
pub fn create_router(state: AppState, guard: EdgeGuard) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(guard, edge_guard))
}
