//! Credential authentication flow
//!
//! Ordering is load-bearing: the rate-limit check short-circuits before
//! any persistence access, and the reset-or-record step always follows
//! the secret comparison.

use gatehouse_db::{Database, Role};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::AuthError;
use crate::password::verify_password;
use crate::rate_limit::{RateLimitKey, RateLimiter};

/// Operator-configured emergency access credential.
///
/// Supplied via environment at startup, never compiled into source.
#[derive(Debug, Clone)]
pub struct BypassCredential {
    pub email: String,
    pub password: String,
}

/// The identity and role produced by a successful authentication
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

/// A valid Argon2 hash that always fails verification, used when the
/// account is missing or has no local secret so both paths cost the same.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// Validates submitted credentials against the persistence collaborator,
/// consulting the rate limiter before and after each attempt.
pub struct Authenticator {
    db: Database,
    limiter: Arc<RateLimiter>,
    bypass: Option<BypassCredential>,
}

impl Authenticator {
    pub fn new(db: Database, limiter: Arc<RateLimiter>, bypass: Option<BypassCredential>) -> Self {
        if bypass.is_some() {
            warn!("Emergency bypass credential is enabled");
        }
        Self {
            db,
            limiter,
            bypass,
        }
    }

    /// Authenticate an (email, password) pair from the given origin
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        origin: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        let key = RateLimitKey::new(email, origin);

        let status = self.limiter.is_locked(&key);
        if status.locked {
            return Err(AuthError::LockedOut {
                remaining_seconds: status.remaining_seconds.unwrap_or(0),
            });
        }

        if let Some(bypass) = &self.bypass {
            if bypass.email.eq_ignore_ascii_case(email.trim()) && bypass.password == password {
                warn!("Sign-in via emergency bypass credential");
                self.limiter.reset_attempts(&key);
                return Ok(AuthenticatedUser {
                    id: "bypass".to_string(),
                    email: bypass.email.clone(),
                    name: Some("Emergency Operator".to_string()),
                    role: Role::SuperAdmin,
                });
            }
        }

        let user = match self.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(e) => {
                // Infrastructure failure is not a bad guess; no attempt
                // is recorded against the key.
                error!("Credential lookup failed: {}", e);
                return Err(AuthError::PersistenceUnavailable);
            }
        };

        // Always run a verification so unknown accounts and accounts
        // without a local secret take the same time as a mismatch.
        let (hash_to_verify, user) = match user {
            Some(u) => match u.password_hash.clone() {
                Some(hash) => (hash, Some(u)),
                None => (DUMMY_HASH.to_string(), None),
            },
            None => (DUMMY_HASH.to_string(), None),
        };

        let password_valid = verify_password(password, &hash_to_verify)?;

        match (user, password_valid) {
            (Some(u), true) => {
                self.limiter.reset_attempts(&key);
                info!("User {} signed in", u.email);
                Ok(AuthenticatedUser {
                    id: u.id.to_string(),
                    email: u.email,
                    name: u.name,
                    role: u.role,
                })
            }
            _ => Err(self.register_failure(&key)),
        }
    }

    fn register_failure(&self, key: &RateLimitKey) -> AuthError {
        let status = self.limiter.record_failed_attempt(key);
        if status.locked {
            AuthError::LockedOut {
                remaining_seconds: status.remaining_seconds.unwrap_or(0),
            }
        } else {
            AuthError::InvalidCredentials
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use crate::rate_limit::RateLimiterConfig;
    use gatehouse_db::NewUser;

    const ORIGIN: &str = "1.2.3.4";

    async fn setup(bypass: Option<BypassCredential>) -> (Authenticator, Arc<RateLimiter>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.insert_user(NewUser {
            email: "admin@example.com".to_string(),
            name: Some("Admin".to_string()),
            password_hash: Some(hash_password("hunter2secret").unwrap()),
            role: Role::Admin,
        })
        .await
        .unwrap();
        db.insert_user(NewUser {
            email: "sso@example.com".to_string(),
            name: None,
            password_hash: None,
            role: Role::User,
        })
        .await
        .unwrap();

        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            max_attempts: 3,
            lockout_secs: 300,
            window_secs: 3600,
        }));
        (
            Authenticator::new(db, limiter.clone(), bypass),
            limiter,
        )
    }

    #[tokio::test]
    async fn test_valid_credentials_succeed() {
        let (auth, _) = setup(None).await;
        let user = auth
            .authenticate("admin@example.com", "hunter2secret", ORIGIN)
            .await
            .unwrap();
        assert_eq!(user.email, "admin@example.com");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_email_match_is_case_insensitive() {
        let (auth, _) = setup(None).await;
        let user = auth
            .authenticate("Admin@Example.COM", "hunter2secret", ORIGIN)
            .await
            .unwrap();
        assert_eq!(user.email, "admin@example.com");
    }

    #[tokio::test]
    async fn test_unknown_and_mismatch_errors_are_identical() {
        let (auth, _) = setup(None).await;

        let unknown = auth
            .authenticate("nobody@example.com", "whatever", ORIGIN)
            .await
            .unwrap_err();
        let mismatch = auth
            .authenticate("admin@example.com", "wrong", ORIGIN)
            .await
            .unwrap_err();

        assert_eq!(unknown.to_string(), mismatch.to_string());
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(mismatch, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_federated_account_cannot_password_login() {
        let (auth, _) = setup(None).await;
        let err = auth
            .authenticate("sso@example.com", "anything", ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_lockout_blocks_even_correct_credentials() {
        let (auth, _) = setup(None).await;

        for _ in 0..2 {
            let err = auth
                .authenticate("admin@example.com", "wrong", ORIGIN)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // Third failure trips the lockout and reports the retry time
        let err = auth
            .authenticate("admin@example.com", "wrong", ORIGIN)
            .await
            .unwrap_err();
        match err {
            AuthError::LockedOut { remaining_seconds } => {
                assert!(remaining_seconds > 0 && remaining_seconds <= 300)
            }
            other => panic!("expected LockedOut, got {:?}", other),
        }

        // Correct credentials are rejected while the key is locked
        let err = auth
            .authenticate("admin@example.com", "hunter2secret", ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::LockedOut { .. }));
    }

    #[tokio::test]
    async fn test_success_resets_the_counter() {
        let (auth, limiter) = setup(None).await;

        for _ in 0..2 {
            let _ = auth.authenticate("admin@example.com", "wrong", ORIGIN).await;
        }
        auth.authenticate("admin@example.com", "hunter2secret", ORIGIN)
            .await
            .unwrap();
        assert!(limiter.is_empty());

        // Two more failures start from zero and do not lock
        for _ in 0..2 {
            let err = auth
                .authenticate("admin@example.com", "wrong", ORIGIN)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn test_lockout_is_scoped_to_origin() {
        let (auth, _) = setup(None).await;

        for _ in 0..3 {
            let _ = auth.authenticate("admin@example.com", "wrong", ORIGIN).await;
        }
        let err = auth
            .authenticate("admin@example.com", "hunter2secret", ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::LockedOut { .. }));

        // A different origin is unaffected
        let user = auth
            .authenticate("admin@example.com", "hunter2secret", "5.6.7.8")
            .await
            .unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_bypass_credential_yields_super_admin() {
        let bypass = BypassCredential {
            email: "ops@example.com".to_string(),
            password: "break-glass".to_string(),
        };
        let (auth, limiter) = setup(Some(bypass)).await;

        let user = auth
            .authenticate("ops@example.com", "break-glass", ORIGIN)
            .await
            .unwrap();
        assert_eq!(user.role, Role::SuperAdmin);
        assert!(limiter.is_empty());

        // Wrong bypass password falls through to the normal path
        let err = auth
            .authenticate("ops@example.com", "nope", ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
