//! Card-key licensing and device binding.
//!
//! This crate handles:
//! - A persisted per-installation device code used for seat binding
//! - Login (bind a license key to this device), unbind, and the service notice
//! - A locally cached verification record with lazy expiry eviction
//! - Two transports for the same remote contract: direct legacy HTTP with
//!   RC4-obfuscated parameters, and a trusted local backend proxy
//!
//! # Design Principles
//!
//! - **Service is the source of truth**: the cache is an offline optimization
//! - **Read-path expiry**: an expired record is evicted when read, never by a timer
//! - **Single-shot calls**: no automatic retry; a denial is never masked as transient
//! - **Injected capabilities**: storage, transport and clock are trait objects
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> kami_license::LicenseResult<()> {
//! use kami_license::{FileStore, LegacyApiConfig, LegacyHttpTransport, LicenseSession};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileStore::open_default()?);
//! let transport = Arc::new(LegacyHttpTransport::new(LegacyApiConfig::default())?);
//! let mut session = LicenseSession::new(store, transport);
//!
//! if session.check_local_verify()?.is_none() {
//!     let info = session.login("ABC123").await?;
//!     println!("licensed for {}", session.remaining_time(info.vip_expire_time));
//! }
//! # Ok(())
//! # }
//! ```

mod clock;
mod device;
mod error;
mod session;
mod store;
mod transport;
mod verify;

pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{device_code, to_base36, DeviceIdentity, DEVICE_CODE_PREFIX};
pub use error::{LicenseError, LicenseResult, VerificationError};
pub use session::{LicenseSession, SessionState};
pub use store::{
    default_store_path, FileStore, KeyValueStore, MemoryStore, DEVICE_CODE_KEY, SAVED_KEY_KEY,
    STORE_FORMAT_VERSION, VERIFY_INFO_KEY,
};
pub use transport::{
    parse_expire_time, CardAuthResult, LicenseTransport, LoginGrant, LoginRequest, ServiceReply,
    UnbindRequest, DEFAULT_TIMEOUT_SECS,
};
pub use verify::{format_expire_time, RemainingTime, VerifyInfo, EXPIRED_MARKER};

#[cfg(feature = "online")]
pub use transport::{
    LegacyApiConfig, LegacyHttpTransport, ProxyConfig, ProxyTransport, LEGACY_APP_KEY,
};
