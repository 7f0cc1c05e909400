//! Account authentication security core.
//!
//! Enrollment, verification, rotation, and teardown of TOTP multi-factor
//! credentials, plus the brute-force protection guarding verification and
//! login attempts: a per-account lockout state machine and a distributed
//! fixed-window rate limiter. This crate owns no network surface; an
//! authentication service calls into it and trusts its verdicts.

pub mod compare;
pub mod error;
pub mod factor;
pub mod keys;
pub mod lockout;
pub mod rate_limit;
pub mod secret;
pub mod service;
pub mod store;
pub mod totp;

pub use error::AuthError;
pub use factor::{FactorState, MfaFactor};
pub use keys::EncryptionKey;
pub use lockout::LockoutPolicy;
pub use rate_limit::{CounterStore, MemoryCounterStore, RateLimitDecision, RateLimiter};
pub use service::{Enrollment, MfaConfig, MfaService, ReenrollPolicy};
pub use store::{MemoryMfaStore, MfaStore};
