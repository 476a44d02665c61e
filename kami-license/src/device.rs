//! Device identity for license binding.
//!
//! The license service binds a key to one installation through an opaque
//! device code. The code is generated once from the current time plus a
//! random suffix and persisted; it only changes if local storage is wiped.

use crate::clock::Clock;
use crate::error::LicenseResult;
use crate::store::{KeyValueStore, DEVICE_CODE_KEY};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Prefix of every generated device code.
pub const DEVICE_CODE_PREFIX: &str = "DEV_";

/// Number of base-36 digits in the random suffix.
const SUFFIX_DIGITS: u32 = 9;

/// A persisted per-installation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    device_code: String,
}

impl DeviceIdentity {
    /// Returns the stored identity, generating and storing one if absent.
    ///
    /// # Errors
    ///
    /// Storage errors propagate. There is no volatile fallback: a code that
    /// is not persisted would silently break seat binding.
    pub fn load_or_create(store: &dyn KeyValueStore, clock: &dyn Clock) -> LicenseResult<Self> {
        if let Some(code) = store.get(DEVICE_CODE_KEY)?.filter(|c| !c.is_empty()) {
            let identity = Self { device_code: code };
            if !identity.is_well_formed() {
                warn!(
                    "stored device code {} was not generated by this client",
                    identity.device_code
                );
            }
            return Ok(identity);
        }

        let identity = Self::generate(clock.now_millis());
        store.set(DEVICE_CODE_KEY, &identity.device_code)?;
        info!("generated new device code {}", identity.device_code);
        Ok(identity)
    }

    /// Synthesizes `DEV_<base36 millis>_<base36 random>`.
    #[must_use]
    pub fn generate(now_millis: i64) -> Self {
        let bound = 36u64.pow(SUFFIX_DIGITS);
        let suffix = rand::thread_rng().gen_range(0..bound);
        let device_code = format!(
            "{DEVICE_CODE_PREFIX}{}_{:0>width$}",
            to_base36(now_millis.max(0) as u64),
            to_base36(suffix),
            width = SUFFIX_DIGITS as usize,
        );
        Self { device_code }
    }

    /// Returns the device code.
    #[must_use]
    pub fn device_code(&self) -> &str {
        &self.device_code
    }

    /// Whether the code has the shape this module generates.
    /// Codes written by other clients are still used as-is.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let Some(rest) = self.device_code.strip_prefix(DEVICE_CODE_PREFIX) else {
            return false;
        };
        let mut parts = rest.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(time), Some(random), None) => {
                !time.is_empty() && !random.is_empty() && is_base36(time) && is_base36(random)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.device_code)
    }
}

/// Returns this installation's device code, creating it on first use.
pub fn device_code(store: &dyn KeyValueStore, clock: &dyn Clock) -> LicenseResult<String> {
    DeviceIdentity::load_or_create(store, clock).map(|id| id.device_code)
}

/// Lowercase base-36 rendering.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

fn is_base36(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}
