//! Remote license service transports.
//!
//! Two strategies speak the same contract:
//!
//! - [`LegacyHttpTransport`] talks to the license server directly, with
//!   request parameters RC4-obfuscated and hex-encoded in the query string.
//! - [`ProxyTransport`] sends parameters in the clear to a trusted local
//!   backend, which talks to the remote service itself.
//!
//! Every reply is classified into a [`ServiceReply`] at the deserialization
//! boundary. Callers never inspect raw response shapes.

use crate::error::{LicenseError, LicenseResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "online")]
pub mod legacy;
#[cfg(feature = "online")]
pub mod proxy;

#[cfg(feature = "online")]
pub use legacy::{LegacyApiConfig, LegacyHttpTransport, LEGACY_APP_KEY};
#[cfg(feature = "online")]
pub use proxy::{ProxyConfig, ProxyTransport};

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Parameters of a login (bind) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub license_key: String,
    pub device_code: String,
    /// Client time, seconds since epoch.
    pub timestamp: i64,
}

/// Parameters of an unbind call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnbindRequest {
    pub license_key: String,
    pub device_code: String,
    pub timestamp: i64,
}

/// What the service grants on a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    /// Seconds since epoch after which the session is invalid.
    pub vip_expire_time: i64,
    /// The service's confirmation text.
    pub message: String,
    /// Expiry exactly as the service rendered it, if it sent one.
    pub expire_time: Option<String>,
}

/// Login outcome as shown to the user by the backend-proxy flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAuthResult {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

impl From<&LoginGrant> for CardAuthResult {
    fn from(grant: &LoginGrant) -> Self {
        Self {
            message: grant.message.clone(),
            expire_time: grant.expire_time.clone(),
        }
    }
}

/// A reply from the license service: either it granted the request, or it
/// refused with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply<T> {
    Granted(T),
    Denied { message: String },
}

impl<T> ServiceReply<T> {
    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }

    /// Converts a denial into [`LicenseError::Service`], message verbatim.
    pub fn into_result(self) -> LicenseResult<T> {
        match self {
            Self::Granted(value) => Ok(value),
            Self::Denied { message } => Err(LicenseError::Service(message)),
        }
    }
}

/// The remote license contract.
///
/// Calls are single-shot: implementations never retry.
#[async_trait]
pub trait LicenseTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Binds `license_key` to `device_code`.
    async fn login(&self, request: &LoginRequest) -> LicenseResult<ServiceReply<LoginGrant>>;

    /// Releases the binding. Granted value is the service's confirmation.
    async fn unbind(&self, request: &UnbindRequest) -> LicenseResult<ServiceReply<String>>;

    /// Fetches the free-text announcement. An empty announcement is a
    /// successful reply with an empty string.
    async fn notice(&self) -> LicenseResult<ServiceReply<String>>;
}

/// Parses a service-rendered expiry into epoch seconds.
///
/// Accepts plain integers, RFC 3339, and `YYYY-MM-DD HH:MM:SS` in local time.
#[must_use]
pub fn parse_expire_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| naive.and_local_timezone(chrono::Local).single())
        .map(|dt| dt.timestamp())
}

#[cfg_attr(not(feature = "online"), allow(dead_code))]
pub(crate) fn malformed(what: impl std::fmt::Display) -> LicenseError {
    LicenseError::Network(format!("malformed response: {what}"))
}
