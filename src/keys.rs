use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::AuthError;

pub const KEY_LENGTH: usize = 32;

/// A normalized 256-bit symmetric key for the secret codec.
///
/// Construction is a hard precondition check: a wrong-length or misencoded
/// key fails with `InvalidKeyFormat` instead of being padded or truncated,
/// since silently accepting it would corrupt every subsequent encryption.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LENGTH]);

impl EncryptionKey {
    /// Accept a raw byte sequence of exactly 32 bytes.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, AuthError> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| AuthError::InvalidKeyFormat)?;
        Ok(Self(key))
    }

    /// Accept a standard base64 string decoding to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, AuthError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| AuthError::InvalidKeyFormat)?;
        Self::from_raw(&bytes)
    }

    /// Accept a hex string decoding to exactly 32 bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, AuthError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| AuthError::InvalidKeyFormat)?;
        Self::from_raw(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("EncryptionKey([redacted])")
    }
}
