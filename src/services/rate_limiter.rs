//! Sliding-window attempt limiter
//!
//! Used to throttle failed password logins per email address: after
//! `max_attempts` failures inside `window`, further attempts are refused
//! until the oldest failure ages out. A successful login clears the key.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;

/// Failures allowed per email before logins are refused
pub const LOGIN_MAX_ATTEMPTS: usize = 5;

/// Window over which login failures are counted, in minutes
pub const LOGIN_WINDOW_MINUTES: i64 = 15;

pub struct AttemptLimiter<K> {
    attempts: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
    max_attempts: usize,
    window: Duration,
}

impl<K: Hash + Eq + Clone> AttemptLimiter<K> {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    /// Whether `key` has used up its attempts at `now`
    pub async fn is_limited_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let attempts = self.attempts.read().await;
        attempts
            .get(key)
            .map(|times| times.iter().filter(|t| **t > cutoff).count() >= self.max_attempts)
            .unwrap_or(false)
    }

    pub async fn is_limited(&self, key: &K) -> bool {
        self.is_limited_at(key, Utc::now()).await
    }

    pub async fn record_at(&self, key: &K, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut attempts = self.attempts.write().await;
        let times = attempts.entry(key.clone()).or_default();
        times.retain(|t| *t > cutoff);
        times.push(now);
    }

    pub async fn record(&self, key: &K) {
        self.record_at(key, Utc::now()).await
    }

    pub async fn clear(&self, key: &K) {
        self.attempts.write().await.remove(key);
    }

    /// Drop keys whose attempts have all aged out
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

/// Failed-login limiter keyed by lowercased email
pub type LoginRateLimiter = AttemptLimiter<String>;

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(LOGIN_MAX_ATTEMPTS, Duration::minutes(LOGIN_WINDOW_MINUTES))
    }
}
