//! Error types for the cipher layer.

use thiserror::Error;

/// Result type for cipher operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the legacy cipher path.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RC4 keys must be between 1 and 256 bytes.
    #[error("invalid key length: expected 1..=256 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// Hex input was malformed, or the decrypted bytes were not UTF-8.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Decode(err.to_string())
    }
}
