//! Per-user, per-route rate limiting.
//!
//! Each (identity, route) pair owns an independent counter with an expiry
//! window. The increment and the expiry-set for a fresh window happen as one
//! indivisible operation against the counter store, so two concurrent
//! requests can never both observe "first in window" or race the increment
//! against a different window epoch. Window start is implicit in "first
//! increment since expiry", not wall-clock aligned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::types::{Result, VaultGuardError};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub permitted: bool,
    /// Remaining time-to-live of the current window. Positive whenever the
    /// request was rejected.
    pub retry_after: Duration,
}

/// Shared counter store with atomic increment-and-expire.
///
/// Implementations back onto the shared key/value store named in
/// configuration. The whole operation must be a single atomic step; a
/// remote store would run it as one server-side script.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter at `key`. If this is the first increment of a
    /// fresh window, the window expiry is set to `window` in the same step.
    ///
    /// Returns the post-increment count and the remaining window TTL.
    async fn increment_and_expire(&self, key: &str, window: Duration) -> Result<(u64, Duration)>;
}

struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

/// In-process [`CounterStore`].
///
/// The dashmap entry guard is held across the whole read-modify-write, which
/// serializes concurrent callers on the same key.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, WindowCounter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window has elapsed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        before - self.counters.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_and_expire(&self, key: &str, window: Duration) -> Result<(u64, Duration)> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter {
                count: 0,
                expires_at: now + window,
            });

        if now >= entry.expires_at {
            // Window elapsed: this increment starts a fresh one.
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;

        let ttl = entry.expires_at.saturating_duration_since(now);
        Ok((entry.count, ttl))
    }
}

/// Rate limiter keyed by (identity, route).
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    fn counter_key(identity: &str, route: &str) -> String {
        format!("ratelimit:{}:{}", identity, route)
    }

    /// Count this request against the (identity, route) window.
    ///
    /// Rejects once the post-increment count exceeds `limit`; the decision
    /// carries the remaining window TTL as `retry_after`.
    pub async fn allow(
        &self,
        identity: &str,
        route: &str,
        limit: u64,
        window: Duration,
    ) -> Result<RateDecision> {
        let key = Self::counter_key(identity, route);
        let (count, ttl) = self.store.increment_and_expire(&key, window).await?;

        if count > limit {
            debug!(identity = %identity, route = %route, count, limit, "rate limit exceeded");
            return Ok(RateDecision {
                permitted: false,
                retry_after: ttl,
            });
        }

        Ok(RateDecision {
            permitted: true,
            retry_after: Duration::ZERO,
        })
    }

    /// Like [`RateLimiter::allow`], but maps rejection to
    /// [`VaultGuardError::RateLimitExceeded`].
    pub async fn check(
        &self,
        identity: &str,
        route: &str,
        limit: u64,
        window: Duration,
    ) -> Result<()> {
        let decision = self.allow(identity, route, limit, window).await?;
        if !decision.permitted {
            return Err(VaultGuardError::RateLimitExceeded {
                retry_after: decision.retry_after,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            let decision = limiter.allow("user-1", "vault", 5, window).await.unwrap();
            assert!(decision.permitted);
        }

        let decision = limiter.allow("user-1", "vault", 5, window).await.unwrap();
        assert!(!decision.permitted);
        assert!(decision.retry_after > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_routes_are_independent() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(
                limiter
                    .allow("user-1", "vault", 3, window)
                    .await
                    .unwrap()
                    .permitted
            );
        }
        assert!(
            !limiter
                .allow("user-1", "vault", 3, window)
                .await
                .unwrap()
                .permitted
        );

        // Same user, different route: fresh counter.
        assert!(
            limiter
                .allow("user-1", "passkey", 3, window)
                .await
                .unwrap()
                .permitted
        );
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        assert!(
            limiter
                .allow("user-1", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );
        assert!(
            !limiter
                .allow("user-1", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );
        assert!(
            limiter
                .allow("user-2", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter();
        let window = Duration::from_millis(20);

        assert!(
            limiter
                .allow("user-1", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );
        assert!(
            !limiter
                .allow("user-1", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(
            limiter
                .allow("user-1", "vault", 1, window)
                .await
                .unwrap()
                .permitted
        );
    }

    #[tokio::test]
    async fn test_check_maps_to_error_with_retry_after() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        limiter.check("user-1", "vault", 1, window).await.unwrap();
        let err = limiter
            .check("user-1", "vault", 1, window)
            .await
            .unwrap_err();

        match err {
            VaultGuardError::RateLimitExceeded { retry_after } => {
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_increments_permit_exactly_limit() {
        let limiter = Arc::new(limiter());
        let window = Duration::from_secs(60);
        let n = 50u64;
        let limit = 10u64;

        let mut handles = Vec::new();
        for _ in 0..n {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.allow("user-1", "vault", limit, window).await.unwrap()
            }));
        }

        let mut permitted = 0u64;
        for handle in handles {
            let decision = handle.await.unwrap();
            if decision.permitted {
                permitted += 1;
            } else {
                assert!(decision.retry_after > Duration::ZERO);
            }
        }

        assert_eq!(permitted, limit.min(n));
    }

    #[tokio::test]
    async fn test_memory_store_cleanup() {
        let store = MemoryCounterStore::new();
        store
            .increment_and_expire("k1", Duration::from_millis(5))
            .await
            .unwrap();
        store
            .increment_and_expire("k2", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.cleanup(), 1);
    }
}
