//! Application state

use gatehouse_auth::{Authenticator, CookieSettings, SessionManager};
use gatehouse_db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<SessionManager>,
    pub cookie: CookieSettings,
}

impl AppState {
    pub fn new(
        db: Database,
        authenticator: Arc<Authenticator>,
        sessions: Arc<SessionManager>,
        cookie: CookieSettings,
    ) -> Self {
        Self {
            db,
            authenticator,
            sessions,
            cookie,
        }
    }
}
