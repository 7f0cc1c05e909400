use serde::{Deserialize, Serialize};

use crate::factor::MfaFactor;

/// Thresholds for the per-account lockout state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_minutes: 5,
        }
    }
}

impl LockoutPolicy {
    pub fn lock_seconds(&self) -> i64 {
        self.lock_minutes * 60
    }
}

/// Whether the account is currently locked out. An elapsed `locked_until`
/// no longer blocks access, but the failure counter is only cleared by the
/// next successful verification, not by expiry.
pub fn is_locked(factor: &MfaFactor, now: i64) -> bool {
    matches!(factor.locked_until, Some(until) if until > now)
}

/// Seconds until the lock elapses, zero when not locked.
pub fn retry_after_seconds(factor: &MfaFactor, now: i64) -> i64 {
    factor
        .locked_until
        .map(|until| (until - now).max(0))
        .unwrap_or(0)
}

/// Register one failed verification attempt. Crossing `max_attempts` sets
/// a time-boxed lock; the lock window is fixed, not sliding.
pub fn register_failure(factor: &mut MfaFactor, now: i64, policy: &LockoutPolicy) {
    factor.failed_attempts += 1;
    if factor.failed_attempts >= policy.max_attempts {
        factor.locked_until = Some(now + policy.lock_seconds());
    }
}

/// Unconditionally clear the failure counter and any lock; called on every
/// successful verification.
pub fn clear_failures(factor: &mut MfaFactor) {
    factor.failed_attempts = 0;
    factor.locked_until = None;
}
