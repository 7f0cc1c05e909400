use thiserror::Error;

/// Unified error type for the authentication security core.
///
/// Cryptographic failure variants deliberately carry no detail beyond their
/// kind: callers surface them as a generic verification failure while the
/// full context is logged server-side, so the error channel never acts as a
/// decryption oracle.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The supplied encryption key is not 32 bytes (raw, base64, or hex).
    #[error("invalid encryption key format")]
    InvalidKeyFormat,

    /// A stored ciphertext blob is too short to contain IV, ciphertext,
    /// and authentication tag.
    #[error("invalid ciphertext format")]
    InvalidCiphertextFormat,

    /// GCM tag verification failed: the ciphertext was tampered with, the
    /// wrong key was used, or a seed no longer matches its stored hash.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A submitted code is not exactly six ASCII digits.
    #[error("invalid code format")]
    InvalidCodeFormat,

    /// The account is locked out from verification attempts.
    #[error("account locked, retry after {retry_after_seconds}s")]
    AccountLocked { retry_after_seconds: i64 },

    /// The backing store could not be reached or returned a fault.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No MFA factor exists for the account.
    #[error("no MFA factor enrolled")]
    FactorNotFound,

    /// The operation requires a factor awaiting its first verification.
    #[error("MFA factor is not pending verification")]
    FactorNotPending,

    /// The operation requires an enabled factor.
    #[error("MFA factor is not enabled")]
    FactorNotEnabled,

    /// Enrollment was refused because an enabled factor already exists.
    #[error("an enabled MFA factor already exists")]
    AlreadyEnrolled,

    /// A fault in the crate's own machinery (entropy source, poisoned
    /// lock, missing key configuration) rather than in the caller's input.
    #[error("internal error: {0}")]
    Internal(String),
}
