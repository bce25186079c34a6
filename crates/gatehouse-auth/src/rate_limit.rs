//! In-memory rate limiter for login attempts
//!
//! Tracks failed attempts per (identity, origin) key and imposes a
//! fixed-duration lockout after a configurable threshold. Explicitly
//! constructed and injected; tests instantiate isolated instances.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts before the key is locked out
    pub max_attempts: u32,
    /// Lockout duration once tripped
    pub lockout_secs: u64,
    /// Idle window after which a non-locked counter resets
    pub window_secs: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            lockout_secs: 5 * 60,
            window_secs: 60 * 60,
        }
    }
}

/// Composite key: submitted identity plus request origin
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RateLimitKey {
    identity: String,
    origin: String,
}

impl RateLimitKey {
    /// Build a key. The identity is normalized (trimmed, lowercased) so
    /// the key matches the case-insensitive credential lookup.
    pub fn new(identity: &str, origin: &str) -> Self {
        Self {
            identity: identity.trim().to_lowercase(),
            origin: origin.to_string(),
        }
    }
}

/// Result of a lockout query or a recorded attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining_seconds: Option<u64>,
}

impl LockStatus {
    fn unlocked() -> Self {
        Self {
            locked: false,
            remaining_seconds: None,
        }
    }

    fn locked_for(remaining_seconds: u64) -> Self {
        Self {
            locked: true,
            remaining_seconds: Some(remaining_seconds),
        }
    }
}

#[derive(Debug, Clone)]
struct AttemptRecord {
    attempts: u32,
    last_attempt: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Seconds until `until`, rounded up
fn remaining_seconds(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (until - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms as u64).div_ceil(1000)
    }
}

/// Failed-login ledger shared across all request handlers
pub struct RateLimiter {
    config: RateLimiterConfig,
    records: Mutex<HashMap<RateLimitKey, AttemptRecord>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lockout(&self) -> Duration {
        Duration::seconds(self.config.lockout_secs as i64)
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs as i64)
    }

    /// Check whether a key is currently locked out.
    ///
    /// Lazy expiry: an elapsed lockout is cleared and the counter reset
    /// as part of the check; a stale non-locked counter is also reset.
    pub fn is_locked(&self, key: &RateLimitKey) -> LockStatus {
        self.is_locked_at(key, Utc::now())
    }

    fn is_locked_at(&self, key: &RateLimitKey, now: DateTime<Utc>) -> LockStatus {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(key) else {
            return LockStatus::unlocked();
        };

        if let Some(until) = record.locked_until {
            if until > now {
                return LockStatus::locked_for(remaining_seconds(until, now));
            }
            record.attempts = 0;
            record.locked_until = None;
            return LockStatus::unlocked();
        }

        if now - record.last_attempt > self.window() {
            record.attempts = 0;
        }

        LockStatus::unlocked()
    }

    /// Record a failed login attempt for a key.
    ///
    /// Idempotent while locked: the counter is not re-incremented and the
    /// lockout window is never extended by further attempts.
    pub fn record_failed_attempt(&self, key: &RateLimitKey) -> LockStatus {
        self.record_failed_attempt_at(key, Utc::now())
    }

    fn record_failed_attempt_at(&self, key: &RateLimitKey, now: DateTime<Utc>) -> LockStatus {
        let mut records = self.records.lock();
        let record = records.entry(key.clone()).or_insert_with(|| AttemptRecord {
            attempts: 0,
            last_attempt: now,
            locked_until: None,
        });

        if let Some(until) = record.locked_until {
            if until > now {
                return LockStatus::locked_for(remaining_seconds(until, now));
            }
            record.attempts = 0;
            record.locked_until = None;
        }

        record.attempts += 1;
        record.last_attempt = now;

        if record.attempts >= self.config.max_attempts {
            let until = now + self.lockout();
            record.locked_until = Some(until);
            return LockStatus::locked_for(remaining_seconds(until, now));
        }

        LockStatus::unlocked()
    }

    /// Remove the record for a key. Called on successful authentication.
    pub fn reset_attempts(&self, key: &RateLimitKey) {
        self.records.lock().remove(key);
    }

    /// Delete records with an elapsed lockout or an idle counter, bounding
    /// memory growth independent of explicit queries. Returns the number
    /// of records removed.
    pub fn remove_expired(&self) -> usize {
        self.remove_expired_at(Utc::now())
    }

    fn remove_expired_at(&self, now: DateTime<Utc>) -> usize {
        let window = self.window();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| {
            let lockout_elapsed = record.locked_until.is_some_and(|until| until < now);
            let idle = now - record.last_attempt > window;
            !(lockout_elapsed || idle)
        });
        before - records.len()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Spawn the periodic reclamation task
    pub fn spawn_reclaimer(self: &Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.remove_expired();
                if removed > 0 {
                    debug!("Reclaimed {} stale rate limit records", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig::default())
    }

    fn key() -> RateLimitKey {
        RateLimitKey::new("a@b.com", "1.2.3.4")
    }

    #[test]
    fn test_locks_after_max_attempts() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        for _ in 0..9 {
            let status = limiter.record_failed_attempt_at(&key, now);
            assert!(!status.locked);
        }
        assert!(!limiter.is_locked_at(&key, now).locked);

        let status = limiter.record_failed_attempt_at(&key, now);
        assert!(status.locked);
        assert_eq!(status.remaining_seconds, Some(300));

        let status = limiter.is_locked_at(&key, now + Duration::seconds(60));
        assert!(status.locked);
        assert_eq!(status.remaining_seconds, Some(240));
    }

    #[test]
    fn test_remaining_time_decreases_monotonically() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        for _ in 0..10 {
            limiter.record_failed_attempt_at(&key, now);
        }

        let mut last = u64::MAX;
        for offset in [0, 60, 120, 299] {
            let status = limiter.is_locked_at(&key, now + Duration::seconds(offset));
            assert!(status.locked);
            let remaining = status.remaining_seconds.unwrap();
            assert!(remaining <= last);
            last = remaining;
        }
    }

    #[test]
    fn test_lockout_is_not_extended_by_further_attempts() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        for _ in 0..10 {
            limiter.record_failed_attempt_at(&key, now);
        }

        // An attempt mid-lockout reports the original window, not a new one
        let status = limiter.record_failed_attempt_at(&key, now + Duration::seconds(100));
        assert!(status.locked);
        assert_eq!(status.remaining_seconds, Some(200));
    }

    #[test]
    fn test_lockout_expires_and_counter_resets() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        for _ in 0..10 {
            limiter.record_failed_attempt_at(&key, now);
        }
        assert!(limiter.is_locked_at(&key, now + Duration::seconds(299)).locked);

        let after = now + Duration::seconds(301);
        assert!(!limiter.is_locked_at(&key, after).locked);

        // Counter restarted from zero: nine more failures stay unlocked
        for _ in 0..9 {
            let status = limiter.record_failed_attempt_at(&key, after);
            assert!(!status.locked);
        }
    }

    #[test]
    fn test_stale_window_resets_counter() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        for _ in 0..5 {
            limiter.record_failed_attempt_at(&key, now);
        }

        let later = now + Duration::seconds(3601);
        assert!(!limiter.is_locked_at(&key, later).locked);

        // The stale counter was reset; a full run of attempts is needed again
        for _ in 0..9 {
            let status = limiter.record_failed_attempt_at(&key, later);
            assert!(!status.locked);
        }
        assert!(limiter.record_failed_attempt_at(&key, later).locked);
    }

    #[test]
    fn test_reset_attempts_clears_the_record() {
        let limiter = limiter();
        let key = key();
        let now = Utc::now();

        limiter.record_failed_attempt_at(&key, now);
        limiter.record_failed_attempt_at(&key, now);
        limiter.reset_attempts(&key);
        assert!(limiter.is_empty());

        // After a success, max_attempts - 1 failures must not lock
        for _ in 0..9 {
            let status = limiter.record_failed_attempt_at(&key, now);
            assert!(!status.locked);
        }

        // No-op on an absent key
        limiter.reset_attempts(&RateLimitKey::new("other@b.com", "1.2.3.4"));
    }

    #[test]
    fn test_keys_are_normalized_but_origins_distinct() {
        let limiter = limiter();
        let now = Utc::now();

        let a = RateLimitKey::new(" A@B.com ", "1.2.3.4");
        let b = RateLimitKey::new("a@b.com", "1.2.3.4");
        assert_eq!(a, b);

        let other_origin = RateLimitKey::new("a@b.com", "5.6.7.8");
        for _ in 0..10 {
            limiter.record_failed_attempt_at(&a, now);
        }
        assert!(limiter.is_locked_at(&b, now).locked);
        assert!(!limiter.is_locked_at(&other_origin, now).locked);
    }

    #[test]
    fn test_reclamation_removes_expired_and_idle_records() {
        let limiter = limiter();
        let now = Utc::now();

        let locked = RateLimitKey::new("locked@b.com", "1.1.1.1");
        for _ in 0..10 {
            limiter.record_failed_attempt_at(&locked, now);
        }

        let idle = RateLimitKey::new("idle@b.com", "1.1.1.1");
        limiter.record_failed_attempt_at(&idle, now);

        let active = RateLimitKey::new("active@b.com", "1.1.1.1");
        limiter.record_failed_attempt_at(&active, now + Duration::seconds(3500));

        // After the lockout and the idle window have both elapsed
        let removed = limiter.remove_expired_at(now + Duration::seconds(3700));
        assert_eq!(removed, 2);
        assert_eq!(limiter.len(), 1);

        // A subsequent check for the reclaimed key starts from scratch
        assert!(!limiter.is_locked_at(&locked, now + Duration::seconds(3700)).locked);
    }
}
