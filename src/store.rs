use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::{error::AuthError, factor::MfaFactor, lockout, lockout::LockoutPolicy};

/// Durable per-account MFA storage.
///
/// Every method is a single all-or-nothing update of one account's record;
/// backends must serialize concurrent mutation per account (row-level lock
/// or CAS), never with a global lock across accounts. Store faults surface
/// as `StoreUnavailable` and are not recovered here: failing open on the
/// lockout path would defeat brute-force protection.
#[async_trait]
pub trait MfaStore: Send + Sync {
    async fn get_factor(&self, account_id: &str) -> Result<Option<MfaFactor>, AuthError>;

    /// Replace the account's factor record wholesale.
    async fn put_factor(&self, account_id: &str, factor: MfaFactor) -> Result<(), AuthError>;

    /// Apply one failed attempt through the lockout state machine and
    /// return the updated record. Compare-and-swap on `expected_version`:
    /// a mismatch means the factor changed under a mid-flight verification
    /// (e.g. a rotation landed first) and fails with `AuthenticationFailed`.
    async fn record_failed_attempt(
        &self,
        account_id: &str,
        expected_version: u32,
        now: i64,
        policy: &LockoutPolicy,
    ) -> Result<MfaFactor, AuthError>;

    /// Record a successful verification: enables the factor, clears the
    /// failure counter and lock, stamps `last_verified_at`. Same
    /// compare-and-swap guard as `record_failed_attempt`, so a verification
    /// that raced a rotation can never enable the unconfirmed replacement.
    async fn mark_verified(
        &self,
        account_id: &str,
        expected_version: u32,
        now: i64,
    ) -> Result<MfaFactor, AuthError>;
}

/// In-memory backend for local development and testing. Uses
/// `Arc<RwLock<...>>` so it can be cloned across tasks; the write lock
/// gives each record update the required per-key atomicity.
#[derive(Clone, Default)]
pub struct MemoryMfaStore {
    factors: Arc<RwLock<HashMap<String, MfaFactor>>>,
}

impl MemoryMfaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MfaStore for MemoryMfaStore {
    async fn get_factor(&self, account_id: &str) -> Result<Option<MfaFactor>, AuthError> {
        let factors = self
            .factors
            .read()
            .map_err(|e| AuthError::StoreUnavailable(format!("lock error: {e}")))?;
        Ok(factors.get(account_id).cloned())
    }

    async fn put_factor(&self, account_id: &str, factor: MfaFactor) -> Result<(), AuthError> {
        let mut factors = self
            .factors
            .write()
            .map_err(|e| AuthError::StoreUnavailable(format!("lock error: {e}")))?;
        factors.insert(account_id.to_string(), factor);
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        account_id: &str,
        expected_version: u32,
        now: i64,
        policy: &LockoutPolicy,
    ) -> Result<MfaFactor, AuthError> {
        let mut factors = self
            .factors
            .write()
            .map_err(|e| AuthError::StoreUnavailable(format!("lock error: {e}")))?;

        let factor = factors
            .get_mut(account_id)
            .ok_or(AuthError::FactorNotFound)?;

        if factor.secret_version != expected_version || factor.secret_hash.is_empty() {
            return Err(AuthError::AuthenticationFailed);
        }

        lockout::register_failure(factor, now, policy);
        Ok(factor.clone())
    }

    async fn mark_verified(
        &self,
        account_id: &str,
        expected_version: u32,
        now: i64,
    ) -> Result<MfaFactor, AuthError> {
        let mut factors = self
            .factors
            .write()
            .map_err(|e| AuthError::StoreUnavailable(format!("lock error: {e}")))?;

        let factor = factors
            .get_mut(account_id)
            .ok_or(AuthError::FactorNotFound)?;

        // A cleared tombstone keeps its version, so the version check alone
        // would let a racing verification resurrect a disabled factor.
        if factor.secret_version != expected_version || factor.secret_hash.is_empty() {
            return Err(AuthError::AuthenticationFailed);
        }

        factor.enabled = true;
        factor.pending_verification = false;
        factor.last_verified_at = Some(now);
        lockout::clear_failures(factor);
        Ok(factor.clone())
    }
}
