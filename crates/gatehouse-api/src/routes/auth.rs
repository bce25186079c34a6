//! Session routes and authentication extractors

use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header::SET_COOKIE, request::Parts, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use gatehouse_auth::{
    authorize, clear_session_cookie, extract_session_token, session_cookie, AuthError,
    SessionClaims, ADMIN_ROLES,
};
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LoginRequest, SessionResponse, SessionUser};

// ==================== Auth Extractors ====================

/// Extractor for a valid session (required)
pub struct RequireSession(pub SessionClaims);

impl<S> FromRequestParts<S> for RequireSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token =
            extract_session_token(&parts.headers).ok_or(ApiError::Auth(AuthError::MissingSession))?;
        let claims = app_state.sessions.verify(&token)?;

        debug!("Session for {} ({})", claims.email, claims.role.as_str());
        Ok(RequireSession(claims))
    }
}

/// Extractor for an admin session (required)
pub struct RequireAdmin(pub SessionClaims);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireSession(claims) = RequireSession::from_request_parts(parts, state).await?;

        authorize(claims.role, ADMIN_ROLES)?;

        Ok(RequireAdmin(claims))
    }
}

// ==================== Input Validation ====================

/// Maximum allowed email length (RFC 5321 path limit)
const MAX_EMAIL_LENGTH: usize = 254;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;

fn validate_login_input(request: &LoginRequest) -> Result<(), ApiError> {
    if request.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email cannot be empty".to_string()));
    }
    if request.email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Email exceeds maximum length of {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Best-effort client origin for rate limiting.
///
/// Trusts the reverse proxy's forwarding headers; requests with no
/// attributable origin share one bucket.
fn client_origin(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "unknown".to_string()
}

// ==================== Auth Routes ====================

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_login_input(&request)?;

    let origin = client_origin(&headers);
    debug!("Login attempt for {} from {}", request.email, origin);

    let user = state
        .authenticator
        .authenticate(&request.email, &request.password, &origin)
        .await?;

    let token = state.sessions.issue(&user.id, &user.email, user.role)?;
    let cookie = session_cookie(&token, state.cookie)
        .map_err(|e| ApiError::Internal(format!("Cookie encoding failed: {}", e)))?;

    let body = SessionResponse {
        authenticated: true,
        user: Some(SessionUser {
            id: user.id,
            email: user.email,
            role: user.role,
            is_admin: user.role.is_admin(),
        }),
    };

    Ok(([(SET_COOKIE, cookie)], Json(body)))
}

/// POST /api/auth/logout
///
/// Idempotent: clears the cookie whether or not a session was present.
async fn logout(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cookie = clear_session_cookie(state.cookie)
        .map_err(|e| ApiError::Internal(format!("Cookie encoding failed: {}", e)))?;

    Ok(([(SET_COOKIE, cookie)], Json(json!({ "success": true }))))
}

/// GET /api/auth/session
///
/// Never errors; an absent or invalid session reports as unauthenticated.
async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let claims = extract_session_token(&headers).and_then(|t| state.sessions.verify(&t).ok());

    Json(match claims {
        Some(claims) => SessionResponse {
            authenticated: true,
            user: Some(SessionUser {
                id: claims.sub,
                email: claims.email,
                role: claims.role,
                is_admin: claims.role.is_admin(),
            }),
        },
        None => SessionResponse {
            authenticated: false,
            user: None,
        },
    })
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
}
