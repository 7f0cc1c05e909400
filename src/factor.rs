use serde::{Deserialize, Serialize};

/// Lifecycle state of an account's MFA factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorState {
    /// No usable secret material (never enrolled, or torn down).
    None,
    /// Secret generated, awaiting the first successful verification.
    Pending,
    /// At least one successful verification since enrollment.
    Enabled,
}

/// Per-account MFA record, persisted as a single atomically-updated row.
///
/// `secret_hash` is the peppered HMAC fingerprint and is always present
/// while a factor exists; `secret_encrypted` is optional ciphertext kept
/// only so the provisioning URI can be re-issued. Timestamps are unix
/// seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaFactor {
    pub secret_hash: Vec<u8>,
    pub secret_encrypted: Option<Vec<u8>>,
    pub secret_version: u32,
    pub enabled: bool,
    pub pending_verification: bool,
    pub failed_attempts: u32,
    pub locked_until: Option<i64>,
    pub last_verified_at: Option<i64>,
}

impl MfaFactor {
    /// Fresh factor entering the pending state after enrollment.
    pub fn pending(secret_hash: Vec<u8>, secret_encrypted: Option<Vec<u8>>, version: u32) -> Self {
        Self {
            secret_hash,
            secret_encrypted,
            secret_version: version,
            enabled: false,
            pending_verification: true,
            failed_attempts: 0,
            locked_until: None,
            last_verified_at: None,
        }
    }

    /// Tombstone left behind by teardown: secret material and counters are
    /// cleared, the version survives so a future re-enrollment never reuses
    /// a number a client might still trust.
    pub fn cleared(version: u32) -> Self {
        Self {
            secret_hash: Vec::new(),
            secret_encrypted: None,
            secret_version: version,
            enabled: false,
            pending_verification: false,
            failed_attempts: 0,
            locked_until: None,
            last_verified_at: None,
        }
    }

    pub fn state(&self) -> FactorState {
        if self.secret_hash.is_empty() {
            FactorState::None
        } else if self.enabled {
            FactorState::Enabled
        } else if self.pending_verification {
            FactorState::Pending
        } else {
            FactorState::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_factor_state() {
        let factor = MfaFactor::pending(vec![1; 32], None, 1);
        assert_eq!(factor.state(), FactorState::Pending);
        assert!(!factor.enabled);
    }

    #[test]
    fn test_enabled_excludes_pending() {
        let mut factor = MfaFactor::pending(vec![1; 32], None, 1);
        factor.enabled = true;
        factor.pending_verification = false;
        assert_eq!(factor.state(), FactorState::Enabled);
    }

    #[test]
    fn test_cleared_factor_keeps_version() {
        let factor = MfaFactor::cleared(4);
        assert_eq!(factor.state(), FactorState::None);
        assert_eq!(factor.secret_version, 4);
        assert!(factor.secret_hash.is_empty());
        assert!(factor.secret_encrypted.is_none());
    }
}
