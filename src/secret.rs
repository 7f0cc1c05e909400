use aes_gcm::{
    aead::{Aead, OsRng},
    AeadCore, Aes256Gcm, Key, KeyInit, Nonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::AuthError, keys::EncryptionKey};

const IV_LENGTH: usize = 12;
const AUTH_TAG_LENGTH: usize = 16;
const SEED_ENTROPY_BYTES: usize = 20;

/// Generate a fresh random TOTP seed, base32-encoded (RFC 4648, no padding).
pub fn generate_seed() -> Result<String, AuthError> {
    let mut seed_bytes = [0u8; SEED_ENTROPY_BYTES];
    getrandom::fill(&mut seed_bytes)
        .map_err(|_| AuthError::Internal("failed to generate TOTP seed".to_string()))?;
    Ok(base32::encode(
        base32::Alphabet::Rfc4648 { padding: false },
        &seed_bytes,
    ))
}

/// Build the `otpauth://` provisioning URI an authenticator app consumes.
pub fn provisioning_uri(seed_base32: &str, account_label: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits=6&period=30",
        urlencoding::encode(issuer),
        urlencoding::encode(account_label),
        seed_base32,
        urlencoding::encode(issuer),
    )
}

/// Peppered one-way fingerprint of a seed: HMAC-SHA-256 keyed by the
/// server-side pepper. Deterministic, never reversed; verification compares
/// a freshly computed hash against the stored one.
pub fn hash_seed(seed_base32: &str, pepper: &[u8]) -> Result<Vec<u8>, AuthError> {
    // `as Mac` disambiguates from `aes_gcm::KeyInit`, which is also in scope.
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(pepper)
        .map_err(|_| AuthError::Internal("invalid pepper".to_string()))?;
    mac.update(seed_base32.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Encrypt a seed with AES-256-GCM under a fresh random 96-bit IV.
///
/// Output layout is `iv || ciphertext || tag`; each field is recoverable
/// from the blob by its fixed length.
pub fn encrypt_seed(seed_base32: &str, key: &EncryptionKey) -> Result<Vec<u8>, AuthError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_and_tag = cipher
        .encrypt(&nonce, seed_base32.as_bytes())
        .map_err(|_| AuthError::Internal("encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(IV_LENGTH + ciphertext_and_tag.len());
    blob.extend_from_slice(nonce.as_slice());
    blob.extend_from_slice(&ciphertext_and_tag);

    Ok(blob)
}

/// Decrypt an `iv || ciphertext || tag` blob back to the base32 seed.
///
/// Fails with `InvalidCiphertextFormat` when a field is missing and
/// `AuthenticationFailed` on tag mismatch; neither carries more detail.
pub fn decrypt_seed(blob: &[u8], key: &EncryptionKey) -> Result<String, AuthError> {
    if blob.len() <= IV_LENGTH + AUTH_TAG_LENGTH {
        return Err(AuthError::InvalidCiphertextFormat);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(&blob[..IV_LENGTH]);

    let seed_bytes = cipher
        .decrypt(nonce, &blob[IV_LENGTH..])
        .map_err(|_| AuthError::AuthenticationFailed)?;

    String::from_utf8(seed_bytes).map_err(|_| AuthError::AuthenticationFailed)
}
