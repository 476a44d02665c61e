//! RC4 keystream and the lowercase-hex wire encoding.
//!
//! The algorithm is reproduced exactly for interoperability with the legacy
//! license server: a 256-entry key schedule followed by the standard PRGA.
//! There is no IV, so equal inputs always produce equal outputs.
//!
//! Strings are processed as their UTF-8 bytes. For the ASCII parameters the
//! server actually receives (keys, device codes, timestamps) this is
//! byte-identical to the legacy client's per-code-unit processing.

use crate::error::{CryptoError, CryptoResult};
use crate::key::CipherKey;

/// RC4 cipher state.
#[derive(Clone)]
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Runs the key schedule for `key`.
    pub fn new(key: &CipherKey) -> Self {
        let key = key.as_bytes();
        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }

        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }

        Self { s, i: 0, j: 0 }
    }

    /// XORs the next `data.len()` keystream bytes into `data`.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let t = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[t as usize];
        }
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rc4").field("state", &"[REDACTED]").finish()
    }
}

/// Applies RC4 under `key` to `data`. Applying it twice restores the input.
pub fn rc4(key: &CipherKey, data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    Rc4::new(key).apply_keystream(&mut out);
    out
}

/// Encrypts `plaintext` and renders each byte as two lowercase hex digits.
pub fn rc4_encrypt(key: &CipherKey, plaintext: &str) -> String {
    hex::encode(rc4(key, plaintext.as_bytes()))
}

/// Decodes hex pairs and decrypts them back into a string.
///
/// # Errors
///
/// Returns [`CryptoError::Decode`] for odd-length input, non-hex characters,
/// or a plaintext that is not valid UTF-8.
pub fn rc4_decrypt(key: &CipherKey, hex_data: &str) -> CryptoResult<String> {
    let bytes = hex::decode(hex_data)?;
    String::from_utf8(rc4(key, &bytes))
        .map_err(|e| CryptoError::Decode(format!("plaintext is not UTF-8: {e}")))
}
