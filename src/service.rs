use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::{
    compare,
    error::AuthError,
    factor::{FactorState, MfaFactor},
    keys::EncryptionKey,
    lockout::{self, LockoutPolicy},
    secret,
    store::MfaStore,
    totp,
};

/// What `enroll` does when the account already has an enabled factor.
/// Replacing an active factor silently is a real policy decision, so it is
/// explicit configuration rather than an inferred default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReenrollPolicy {
    /// Refuse with `AlreadyEnrolled`; the caller must disable first
    /// (typically after re-authenticating the user).
    #[default]
    RejectWhenEnabled,
    /// Overwrite the active factor; the account drops back to pending
    /// until the replacement is confirmed.
    ReplaceActive,
}

/// Externally supplied knobs for the lifecycle manager. Nothing here is
/// global mutable state; secrets come from the caller's secret management.
pub struct MfaConfig {
    /// Server-side HMAC pepper, distinct from the encryption key.
    pub pepper: Vec<u8>,
    /// Optional at-rest encryption key. Without it the raw seed is only
    /// held transiently between enrollment and first confirmation, and
    /// provisioning URIs cannot be re-issued later.
    pub encryption_key: Option<EncryptionKey>,
    /// Issuer label embedded in provisioning URIs.
    pub issuer: String,
    /// TOTP acceptance window in 30-second steps on each side of now.
    pub window_steps: i64,
    pub lockout: LockoutPolicy,
    pub reenroll: ReenrollPolicy,
}

impl MfaConfig {
    pub fn new(pepper: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
            encryption_key: None,
            issuer: issuer.into(),
            window_steps: 1,
            lockout: LockoutPolicy::default(),
            reenroll: ReenrollPolicy::default(),
        }
    }
}

/// Result of starting an enrollment or rotation. The raw seed is never
/// returned directly; it travels to the authenticator app inside the
/// provisioning URI only.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub provisioning_uri: String,
    pub secret_version: u32,
}

/// Orchestrates the MFA factor lifecycle: NONE -> PENDING -> ENABLED, with
/// ENABLED -> PENDING on rotation and teardown back to NONE.
pub struct MfaService {
    store: Arc<dyn MfaStore>,
    config: MfaConfig,
    // Raw seeds held in-process when no encryption key is configured; the
    // persisted record only carries the peppered hash. A multi-instance
    // deployment needs the encrypted-seed path instead.
    seed_cache: Mutex<HashMap<String, String>>,
}

impl MfaService {
    pub fn new(store: Arc<dyn MfaStore>, config: MfaConfig) -> Self {
        Self {
            store,
            config,
            seed_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Begin enrollment: generate a seed, store the pending factor, and
    /// return the provisioning URI. Overwrites any prior pending factor;
    /// behavior over an enabled factor follows `ReenrollPolicy`.
    pub async fn enroll(
        &self,
        account_id: &str,
        account_label: &str,
    ) -> Result<Enrollment, AuthError> {
        let existing = self.store.get_factor(account_id).await?;

        if let Some(factor) = &existing {
            if factor.state() == FactorState::Enabled
                && self.config.reenroll == ReenrollPolicy::RejectWhenEnabled
            {
                return Err(AuthError::AlreadyEnrolled);
            }
        }

        let version = existing.as_ref().map(|f| f.secret_version + 1).unwrap_or(1);
        self.install_seed(account_id, account_label, version, existing.as_ref())
            .await
            .inspect(|_| tracing::info!(account_id, version, "MFA enrollment started"))
    }

    /// Verify the first code after enrollment; success transitions the
    /// factor from PENDING to ENABLED. Returns `Ok(false)` for a wrong
    /// code (recorded as a failed attempt, pending state untouched).
    pub async fn confirm_first_code(&self, account_id: &str, code: &str) -> Result<bool, AuthError> {
        self.confirm_first_code_at(account_id, code, Utc::now().timestamp())
            .await
    }

    pub async fn confirm_first_code_at(
        &self,
        account_id: &str,
        code: &str,
        now: i64,
    ) -> Result<bool, AuthError> {
        let factor = self
            .store
            .get_factor(account_id)
            .await?
            .ok_or(AuthError::FactorNotFound)?;

        if factor.state() != FactorState::Pending {
            return Err(AuthError::FactorNotPending);
        }

        self.run_verification(account_id, &factor, code, now).await
    }

    /// Verify a code against the account's enabled factor.
    pub async fn verify_code(&self, account_id: &str, code: &str) -> Result<bool, AuthError> {
        self.verify_code_at(account_id, code, Utc::now().timestamp())
            .await
    }

    pub async fn verify_code_at(
        &self,
        account_id: &str,
        code: &str,
        now: i64,
    ) -> Result<bool, AuthError> {
        let factor = self
            .store
            .get_factor(account_id)
            .await?
            .ok_or(AuthError::FactorNotFound)?;

        if factor.state() != FactorState::Enabled {
            return Err(AuthError::FactorNotEnabled);
        }

        self.run_verification(account_id, &factor, code, now).await
    }

    /// Check a caller-held raw seed against the stored peppered fingerprint
    /// in constant time. This path needs neither the encryption key nor the
    /// ciphertext, so losing the key never breaks hash-based validation.
    pub async fn verify_seed(&self, account_id: &str, seed_base32: &str) -> Result<bool, AuthError> {
        let factor = self
            .store
            .get_factor(account_id)
            .await?
            .ok_or(AuthError::FactorNotFound)?;

        let hash = secret::hash_seed(seed_base32, &self.config.pepper)?;
        Ok(compare::constant_time_eq(&hash, &factor.secret_hash))
    }

    /// Replace an enabled factor with a fresh seed. The version increments,
    /// the factor drops back to PENDING, and the old seed becomes unusable
    /// immediately; failure counters and any lock carry over.
    pub async fn rotate(
        &self,
        account_id: &str,
        account_label: &str,
    ) -> Result<Enrollment, AuthError> {
        let factor = self
            .store
            .get_factor(account_id)
            .await?
            .ok_or(AuthError::FactorNotFound)?;

        if factor.state() != FactorState::Enabled {
            return Err(AuthError::FactorNotEnabled);
        }

        let version = factor.secret_version + 1;
        self.install_seed(account_id, account_label, version, Some(&factor))
            .await
            .inspect(|_| tracing::info!(account_id, version, "MFA factor rotated"))
    }

    /// Tear the factor down: secret material and counters are cleared, the
    /// version number survives for any future re-enrollment.
    pub async fn disable(&self, account_id: &str) -> Result<(), AuthError> {
        let factor = self
            .store
            .get_factor(account_id)
            .await?
            .ok_or(AuthError::FactorNotFound)?;

        self.store
            .put_factor(account_id, MfaFactor::cleared(factor.secret_version))
            .await?;
        self.remove_cached_seed(account_id);
        tracing::info!(account_id, "MFA factor disabled");
        Ok(())
    }

    /// Generate and persist a pending factor at `version`. Lockout state
    /// carries over from `previous`: neither re-enrollment nor rotation may
    /// launder an in-progress lock or the failure counter.
    async fn install_seed(
        &self,
        account_id: &str,
        account_label: &str,
        version: u32,
        previous: Option<&MfaFactor>,
    ) -> Result<Enrollment, AuthError> {
        let seed = secret::generate_seed()?;
        let hash = secret::hash_seed(&seed, &self.config.pepper)?;
        let encrypted = match &self.config.encryption_key {
            Some(key) => Some(secret::encrypt_seed(&seed, key)?),
            None => None,
        };

        let mut factor = MfaFactor::pending(hash, encrypted, version);
        if let Some(previous) = previous {
            factor.failed_attempts = previous.failed_attempts;
            factor.locked_until = previous.locked_until;
        }

        self.store.put_factor(account_id, factor).await?;

        let mut seed_cache = self.seed_cache_lock()?;
        if self.config.encryption_key.is_none() {
            seed_cache.insert(account_id.to_string(), seed.clone());
        } else {
            seed_cache.remove(account_id);
        }
        drop(seed_cache);

        Ok(Enrollment {
            provisioning_uri: secret::provisioning_uri(&seed, account_label, &self.config.issuer),
            secret_version: version,
        })
    }

    /// Common verification gate: lock check, code-format check, seed
    /// recovery plus fingerprint cross-check, then the TOTP window scan.
    /// Success and failure are each recorded as one atomic store update,
    /// version-guarded so an attempt that raced a rotation (or teardown)
    /// fails instead of touching the replacement factor.
    async fn run_verification(
        &self,
        account_id: &str,
        factor: &MfaFactor,
        code: &str,
        now: i64,
    ) -> Result<bool, AuthError> {
        if lockout::is_locked(factor, now) {
            return Err(AuthError::AccountLocked {
                retry_after_seconds: lockout::retry_after_seconds(factor, now),
            });
        }

        let code = code.trim();
        if !totp::is_valid_code_format(code) {
            return Err(AuthError::InvalidCodeFormat);
        }

        let seed = self.recover_seed(account_id, factor)?;

        // A recovered seed whose fingerprint no longer matches the record
        // is stale, e.g. a verification racing a rotation. Fail it before
        // any code comparison.
        let recomputed = secret::hash_seed(&seed, &self.config.pepper)?;
        if !compare::constant_time_eq(&recomputed, &factor.secret_hash) {
            tracing::warn!(account_id, "recovered seed does not match stored fingerprint");
            return Err(AuthError::AuthenticationFailed);
        }

        let verified = totp::verify_at(
            &seed,
            code,
            now,
            totp::TOTP_STEP_SECONDS,
            self.config.window_steps,
        )?;

        if verified {
            self.store
                .mark_verified(account_id, factor.secret_version, now)
                .await?;
        } else {
            let updated = self
                .store
                .record_failed_attempt(account_id, factor.secret_version, now, &self.config.lockout)
                .await?;
            if lockout::is_locked(&updated, now) {
                tracing::warn!(
                    account_id,
                    failed_attempts = updated.failed_attempts,
                    "account locked after repeated MFA failures"
                );
            }
        }

        Ok(verified)
    }

    fn recover_seed(&self, account_id: &str, factor: &MfaFactor) -> Result<String, AuthError> {
        if let Some(blob) = &factor.secret_encrypted {
            let key = self.config.encryption_key.as_ref().ok_or_else(|| {
                AuthError::Internal("encryption key not configured".to_string())
            })?;
            return secret::decrypt_seed(blob, key).inspect_err(|e| {
                tracing::warn!(account_id, error = %e, "stored seed failed to decrypt");
            });
        }

        self.seed_cache_lock()?
            .get(account_id)
            .cloned()
            .ok_or_else(|| AuthError::Internal("raw seed unavailable for verification".to_string()))
    }

    fn remove_cached_seed(&self, account_id: &str) {
        if let Ok(mut seed_cache) = self.seed_cache_lock() {
            seed_cache.remove(account_id);
        }
    }

    fn seed_cache_lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AuthError> {
        self.seed_cache
            .lock()
            .map_err(|e| AuthError::Internal(format!("lock error: {e}")))
    }
}
