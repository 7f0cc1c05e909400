use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::AuthError;

pub const TOTP_STEP_SECONDS: i64 = 30;
pub const TOTP_DIGITS: u32 = 6;

/// Returns true when `code` is exactly six ASCII digits.
///
/// Callers reject non-conforming input before any HOTP computation or
/// hash comparison is attempted.
pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == TOTP_DIGITS as usize && code.bytes().all(|b| b.is_ascii_digit())
}

/// Compute the TOTP code for a base32 seed at the given unix timestamp.
pub fn code_at(seed_base32: &str, timestamp: i64, step_seconds: i64) -> Result<String, AuthError> {
    if step_seconds <= 0 {
        return Err(AuthError::Internal("invalid TOTP step".to_string()));
    }
    if timestamp < 0 {
        return Err(AuthError::Internal("invalid timestamp".to_string()));
    }

    let seed = decode_seed(seed_base32)?;
    let counter = (timestamp / step_seconds) as u64;
    hotp_code(&seed, counter)
}

/// Verify a submitted code against a base32 seed, tolerating clock drift of
/// up to `window_steps` time steps on either side of `timestamp` (inclusive).
///
/// The window is a per-call parameter rather than shared verifier state, so
/// concurrent verifications with different tolerances cannot interfere.
pub fn verify_at(
    seed_base32: &str,
    code: &str,
    timestamp: i64,
    step_seconds: i64,
    window_steps: i64,
) -> Result<bool, AuthError> {
    if step_seconds <= 0 {
        return Err(AuthError::Internal("invalid TOTP step".to_string()));
    }
    if timestamp < 0 {
        return Err(AuthError::Internal("invalid timestamp".to_string()));
    }

    let trimmed_code = code.trim();
    if !is_valid_code_format(trimmed_code) {
        return Ok(false);
    }

    for drift in -window_steps..=window_steps {
        let check_timestamp = timestamp + (drift * step_seconds);
        if check_timestamp < 0 {
            continue;
        }

        let expected = code_at(seed_base32, check_timestamp, step_seconds)?;
        if crate::compare::constant_time_eq(expected.as_bytes(), trimmed_code.as_bytes()) {
            return Ok(true);
        }
    }

    Ok(false)
}

fn decode_seed(seed_base32: &str) -> Result<Vec<u8>, AuthError> {
    let cleaned = seed_base32.trim().replace(' ', "").to_uppercase();
    if cleaned.is_empty() {
        return Err(AuthError::Internal("invalid TOTP seed".to_string()));
    }

    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &cleaned)
        .ok_or_else(|| AuthError::Internal("invalid TOTP seed".to_string()))
}

fn hotp_code(seed: &[u8], counter: u64) -> Result<String, AuthError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(seed)
        .map_err(|_| AuthError::Internal("invalid TOTP seed".to_string()))?;
    mac.update(&counter.to_be_bytes());
    let hmac = mac.finalize().into_bytes();

    // RFC 4226 dynamic truncation.
    let offset = (hmac[19] & 0x0f) as usize;
    let code = (((hmac[offset] & 0x7f) as u32) << 24)
        | ((hmac[offset + 1] as u32) << 16)
        | ((hmac[offset + 2] as u32) << 8)
        | (hmac[offset + 3] as u32);
    let modulus = 10u32.pow(TOTP_DIGITS);

    Ok(format!(
        "{:0width$}",
        code % modulus,
        width = TOTP_DIGITS as usize
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_totp_matches_known_vector() {
        // RFC 6238 appendix B, SHA-1, T = 59.
        let code = code_at(TEST_SEED, 59, TOTP_STEP_SECONDS).expect("totp code");
        assert_eq!(code, "287082");
    }

    #[test]
    fn test_verify_current_step() {
        let now = 1_700_000_000;
        let code = code_at(TEST_SEED, now, TOTP_STEP_SECONDS).expect("totp code");
        assert!(verify_at(TEST_SEED, &code, now, TOTP_STEP_SECONDS, 1).expect("verify result"));
    }

    #[test]
    fn test_verify_accepts_drift_within_window() {
        let now = 1_700_000_000;
        let prior = code_at(TEST_SEED, now - TOTP_STEP_SECONDS, TOTP_STEP_SECONDS).expect("code");
        let next = code_at(TEST_SEED, now + TOTP_STEP_SECONDS, TOTP_STEP_SECONDS).expect("code");

        assert!(verify_at(TEST_SEED, &prior, now, TOTP_STEP_SECONDS, 1).expect("verify result"));
        assert!(verify_at(TEST_SEED, &next, now, TOTP_STEP_SECONDS, 1).expect("verify result"));
    }

    #[test]
    fn test_verify_rejects_outside_window() {
        let now = 1_700_000_000;
        let old = code_at(TEST_SEED, now - TOTP_STEP_SECONDS * 2, TOTP_STEP_SECONDS).expect("code");

        assert!(!verify_at(TEST_SEED, &old, now, TOTP_STEP_SECONDS, 1).expect("verify result"));
        // A wider caller-supplied window accepts the same code.
        assert!(verify_at(TEST_SEED, &old, now, TOTP_STEP_SECONDS, 2).expect("verify result"));
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        let now = 1_700_000_000;
        for code in ["12345", "1234567", "12345a", "", "......"] {
            assert!(!verify_at(TEST_SEED, code, now, TOTP_STEP_SECONDS, 1).expect("verify result"));
        }
    }

    #[test]
    fn test_code_format_check() {
        assert!(is_valid_code_format("000000"));
        assert!(!is_valid_code_format("00000"));
        assert!(!is_valid_code_format("0000000"));
        assert!(!is_valid_code_format("12e456"));
    }
}
