use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AuthError;

/// Shared fixed-window counter storage.
///
/// `incr` must be a single atomic increment-and-conditionally-set-expiry
/// against the shared store (Redis `INCR` + `EXPIRE NX`): the window TTL is
/// assigned only when the key is first created and never refreshed by later
/// increments. Two concurrent callers must never both observe a fresh
/// window for the same key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, opening a `window_seconds` window if absent, and
    /// return the post-increment count.
    async fn incr(&self, key: &str, window_seconds: i64) -> Result<u64, AuthError>;
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    /// Seconds a blocked caller should wait before retrying.
    pub retry_after_seconds: Option<i64>,
}

/// Fixed-window rate limiter over an arbitrary identifier (IP, account id).
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Count one request for `identifier` against `limit` per window.
    ///
    /// When the counter store is unreachable the limiter fails open:
    /// availability of the protected service wins over strict throttling,
    /// and the fault is logged. Lockout and lifecycle stores make the
    /// opposite choice.
    pub async fn check(
        &self,
        identifier: &str,
        limit: u64,
        window_seconds: i64,
    ) -> RateLimitDecision {
        let key = format!("rate-limit:{identifier}");

        let count = match self.store.incr(&key, window_seconds).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "counter store unavailable, failing open");
                return RateLimitDecision {
                    allowed: true,
                    remaining: limit,
                    limit,
                    retry_after_seconds: None,
                };
            }
        };

        let allowed = count <= limit;
        RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(count),
            limit,
            retry_after_seconds: (!allowed).then_some(window_seconds),
        }
    }
}

/// In-memory counter backend for local development and testing. One mutex
/// over the whole map makes each `incr` atomic within the process; a real
/// deployment backs the trait with the distributed store's own atomic
/// primitives so the guarantee holds across process instances.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    windows: Arc<Mutex<HashMap<String, CounterWindow>>>,
}

#[derive(Debug, Clone, Copy)]
struct CounterWindow {
    count: u64,
    expires_at: i64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr_at(&self, key: &str, window_seconds: i64, now: i64) -> Result<u64, AuthError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| AuthError::StoreUnavailable(format!("lock error: {e}")))?;

        let window = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.expires_at <= now {
                    // Window elapsed: start a fresh one.
                    w.count = 0;
                    w.expires_at = now + window_seconds;
                }
            })
            .or_insert(CounterWindow {
                count: 0,
                expires_at: now + window_seconds,
            });

        window.count += 1;
        Ok(window.count)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window_seconds: i64) -> Result<u64, AuthError> {
        self.incr_at(key, window_seconds, Utc::now().timestamp())
    }
}
