//! Session token management
//!
//! HS256 JWTs with an absolute lifetime anchored to the first issuance.
//! A refresh rotates `iat` (the activity marker) but carries `orig_iat`
//! forward, so re-issuance can never extend a session past
//! `orig_iat + max_age`.

use chrono::{DateTime, Duration, Utc};
use gatehouse_db::Role;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthError;

/// Session claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Role claim, fixed at issuance time
    pub role: Role,
    /// Last issuance (rotated on refresh)
    pub iat: i64,
    /// First issuance; anchors the absolute expiration
    pub orig_iat: i64,
    /// Absolute expiration (orig_iat + max age)
    pub exp: i64,
    /// Per-login nonce, stable across refreshes of one session
    pub jti: String,
}

/// Issues, verifies, and refreshes session tokens
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
    update_age: Duration,
}

impl SessionManager {
    pub fn new(secret: &str, max_age_secs: i64, update_age_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            max_age: Duration::seconds(max_age_secs),
            update_age: Duration::seconds(update_age_secs),
        }
    }

    /// Absolute session lifetime in seconds (also the cookie Max-Age)
    pub fn max_age_secs(&self) -> i64 {
        self.max_age.num_seconds()
    }

    /// Issue a fresh token for a newly authenticated user
    pub fn issue(&self, user_id: &str, email: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat,
            orig_iat: iat,
            exp: iat + self.max_age.num_seconds(),
            jti: Uuid::new_v4().to_string(),
        };

        debug!("Issuing session token for {}", email);

        self.encode(&claims)
    }

    fn encode(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Verify a token's signature and expiration and return its claims.
    ///
    /// The absolute age check against `orig_iat` runs independently of the
    /// signature library's `exp` validation: a token past max age is
    /// expired regardless of how it was signed.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthError> {
        let validation = Validation::default();

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::SessionExpired,
                _ => AuthError::InvalidToken,
            })?;

        let claims = token_data.claims;
        if now.timestamp() - claims.orig_iat > self.max_age.num_seconds() {
            return Err(AuthError::SessionExpired);
        }

        Ok(claims)
    }

    /// Whether a valid session is due for rolling re-issuance
    pub fn needs_refresh(&self, claims: &SessionClaims) -> bool {
        self.needs_refresh_at(claims, Utc::now())
    }

    pub(crate) fn needs_refresh_at(&self, claims: &SessionClaims, now: DateTime<Utc>) -> bool {
        let age = now.timestamp() - claims.iat;
        let total_age = now.timestamp() - claims.orig_iat;
        age >= self.update_age.num_seconds() && total_age < self.max_age.num_seconds()
    }

    /// Re-issue a token with a fresh `iat`, preserving subject, role,
    /// nonce lineage, and the absolute expiration.
    pub fn refresh(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        self.refresh_at(claims, Utc::now())
    }

    pub(crate) fn refresh_at(
        &self,
        claims: &SessionClaims,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let refreshed = SessionClaims {
            iat: now.timestamp(),
            ..claims.clone()
        };

        debug!("Refreshing session token for {}", refreshed.email);

        self.encode(&refreshed)
    }
}
