//! Edge guard middleware
//!
//! Intercepts every request whose path falls under a protected prefix,
//! validating the session cookie and the embedded role claim before any
//! handler runs. The per-handler extractors re-check independently; both
//! call sites share [`crate::access::authorize`].

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::access::{authorize, ADMIN_ROLES};
use crate::cookie::{clear_session_cookie, extract_session_token, session_cookie, CookieSettings};
use crate::token::SessionManager;

/// Paths the guard intercepts and where it sends rejected requests
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Prefixes under which a valid admin session is required
    pub protected_prefixes: Vec<String>,
    /// The sign-in page; never redirected away from
    pub sign_in_path: String,
    /// Where authenticated-but-unauthorized requests land
    pub public_landing_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: vec!["/admin".to_string(), "/api/admin".to_string()],
            sign_in_path: "/admin/login".to_string(),
            public_landing_path: "/".to_string(),
        }
    }
}

/// State handed to the edge guard middleware
#[derive(Clone)]
pub struct EdgeGuard {
    pub sessions: Arc<SessionManager>,
    pub config: GuardConfig,
    pub cookie: CookieSettings,
}

fn is_protected(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

fn wants_logout(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .any(|pair| pair == "logout" || pair.starts_with("logout="))
    })
}

fn append_cookie(mut response: Response, value: Result<http::HeaderValue, http::header::InvalidHeaderValue>) -> Response {
    if let Ok(value) = value {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

/// Edge enforcement point for protected path prefixes
pub async fn edge_guard(State(guard): State<EdgeGuard>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let token = extract_session_token(request.headers());

    // The sign-in page is always served. Stale cookies (and explicit
    // logout intents) are cleared so a fresh session can start; a valid
    // session is left alone and the page decides what to show.
    if path == guard.config.sign_in_path {
        let logout = wants_logout(request.uri().query());
        let valid = token
            .as_deref()
            .is_some_and(|t| guard.sessions.verify(t).is_ok());
        let had_cookie = token.is_some();

        let response = next.run(request).await;
        if logout || (had_cookie && !valid) {
            return append_cookie(response, clear_session_cookie(guard.cookie));
        }
        return response;
    }

    if !is_protected(&path, &guard.config.protected_prefixes) {
        return next.run(request).await;
    }

    let claims = match token {
        None => {
            debug!("No session for protected path {}", path);
            return Redirect::temporary(&guard.config.sign_in_path).into_response();
        }
        Some(token) => match guard.sessions.verify(&token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejecting session for {}: {}", path, e);
                let response =
                    Redirect::temporary(&guard.config.sign_in_path).into_response();
                return append_cookie(response, clear_session_cookie(guard.cookie));
            }
        },
    };

    if authorize(claims.role, ADMIN_ROLES).is_err() {
        debug!(
            "Role {} not allowed under {}, redirecting to landing",
            claims.role.as_str(),
            path
        );
        return Redirect::temporary(&guard.config.public_landing_path).into_response();
    }

    // Rolling re-issuance for sessions past the update age; the absolute
    // cap is enforced inside verify/refresh.
    let refreshed = if guard.sessions.needs_refresh(&claims) {
        guard.sessions.refresh(&claims).ok()
    } else {
        None
    };

    let response = next.run(request).await;
    match refreshed {
        Some(token) => append_cookie(response, session_cookie(&token, guard.cookie)),
        None => response,
    }
}
