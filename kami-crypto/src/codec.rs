//! Parameter codecs used by the license transports.
//!
//! A transport holds an `Arc<dyn ParamCodec>` and never sees key material.
//! [`Rc4HexCodec`] speaks the legacy obfuscated scheme; [`PassthroughCodec`]
//! leaves parameters in the clear for endpoints that do not expect it.

use crate::cipher::{rc4_decrypt, rc4_encrypt};
use crate::error::CryptoResult;
use crate::key::CipherKey;

/// Encodes outgoing request parameters and decodes incoming payloads.
pub trait ParamCodec: Send + Sync {
    /// Encode a parameter string for the wire.
    fn encode(&self, plaintext: &str) -> String;

    /// Decode a payload previously produced by `encode` on the other side.
    fn decode(&self, wire: &str) -> CryptoResult<String>;

    /// Whether `encode` actually transforms its input.
    fn is_obfuscating(&self) -> bool;
}

/// RC4 under a fixed pre-shared key, rendered as lowercase hex.
#[derive(Debug, Clone)]
pub struct Rc4HexCodec {
    key: CipherKey,
}

impl Rc4HexCodec {
    pub fn new(key: CipherKey) -> Self {
        Self { key }
    }

    /// Codec keyed with the key embedded in legacy clients.
    pub fn legacy() -> Self {
        Self::new(CipherKey::legacy())
    }
}

impl ParamCodec for Rc4HexCodec {
    fn encode(&self, plaintext: &str) -> String {
        rc4_encrypt(&self.key, plaintext)
    }

    fn decode(&self, wire: &str) -> CryptoResult<String> {
        rc4_decrypt(&self.key, wire)
    }

    fn is_obfuscating(&self) -> bool {
        true
    }
}

/// No-op codec. Data passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl ParamCodec for PassthroughCodec {
    fn encode(&self, plaintext: &str) -> String {
        plaintext.to_string()
    }

    fn decode(&self, wire: &str) -> CryptoResult<String> {
        Ok(wire.to_string())
    }

    fn is_obfuscating(&self) -> bool {
        false
    }
}
