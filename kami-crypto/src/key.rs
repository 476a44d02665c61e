//! Pre-shared RC4 key material.
//!
//! The legacy license endpoint expects parameters obfuscated with a key that
//! ships inside every client build. Anyone holding a client binary holds the
//! key, so nothing keyed here provides confidentiality.

use crate::error::{CryptoError, CryptoResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest key RC4's key schedule can make use of.
pub const MAX_KEY_SIZE: usize = 256;

/// Key embedded in clients talking to the legacy endpoint.
pub const LEGACY_CIPHER_KEY: &str = "8HacPHMcsWK10002";

/// An RC4 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    bytes: Vec<u8>,
}

impl CipherKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for an empty key or one
    /// longer than [`MAX_KEY_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.is_empty() || bytes.len() > MAX_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the key embedded in legacy clients.
    pub fn legacy() -> Self {
        Self {
            bytes: LEGACY_CIPHER_KEY.as_bytes().to_vec(),
        }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::str::FromStr for CipherKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> CryptoResult<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
