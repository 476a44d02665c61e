//! Legacy parameter obfuscation for the card-key license client.
//!
//! Provides the RC4 stream cipher and the lowercase-hex encoding the legacy
//! license endpoint expects for request parameters.
//!
//! # Security
//!
//! The key is compiled into every client, so this is obfuscation, not
//! encryption. There is no IV or nonce: the same key and input always yield
//! the same output. Keep it only for wire compatibility.

mod cipher;
mod codec;
mod error;
mod key;

pub use cipher::{rc4, rc4_decrypt, rc4_encrypt, Rc4};
pub use codec::{ParamCodec, PassthroughCodec, Rc4HexCodec};
pub use error::{CryptoError, CryptoResult};
pub use key::{CipherKey, LEGACY_CIPHER_KEY, MAX_KEY_SIZE};
