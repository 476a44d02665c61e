//! License session manager.
//!
//! The single place that decides whether this installation is licensed.
//!
//! ```text
//! Unverified --login--> Verifying --granted--> Verified
//!                           |                      |
//!                           +--denied/failed--> Unverified
//! Verified --expiry seen on read--> Expired --cache evicted--> Unverified
//! Verified/Expired --unbind ok--> Unverified
//! ```
//!
//! Expiry is detected lazily on the read path; there is no background timer.
//! Remote calls are single-shot. `login` and `unbind` take `&mut self`, so at
//! most one license mutation is in flight per manager.

use crate::clock::{Clock, SystemClock};
use crate::device::DeviceIdentity;
use crate::error::{LicenseError, LicenseResult};
use crate::store::{KeyValueStore, SAVED_KEY_KEY, VERIFY_INFO_KEY};
use crate::transport::{CardAuthResult, LicenseTransport, LoginRequest, UnbindRequest};
use crate::verify::{RemainingTime, VerifyInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "info")]
pub enum SessionState {
    Unverified,
    Verifying,
    Verified(VerifyInfo),
    Expired,
}

impl SessionState {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verifying => "verifying",
            Self::Verified(_) => "verified",
            Self::Expired => "expired",
        }
    }
}

/// Holds the license session for the life of the process.
pub struct LicenseSession {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn LicenseTransport>,
    clock: Arc<dyn Clock>,
    state: SessionState,
    last_auth: Option<CardAuthResult>,
}

impl LicenseSession {
    /// Creates a session on the system clock.
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn LicenseTransport>) -> Self {
        Self::with_clock(store, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn LicenseTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            state: SessionState::Unverified,
            last_auth: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Name of the transport in use.
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// What the service said on the last successful login in this process.
    #[must_use]
    pub fn last_auth_result(&self) -> Option<&CardAuthResult> {
        self.last_auth.as_ref()
    }

    /// This installation's device code, created on first use.
    pub fn device_code(&self) -> LicenseResult<String> {
        DeviceIdentity::load_or_create(self.store.as_ref(), self.clock.as_ref())
            .map(|id| id.device_code().to_string())
    }

    /// The key saved by the last successful login, if any.
    pub fn saved_license_key(&self) -> LicenseResult<Option<String>> {
        Ok(self.store.get(SAVED_KEY_KEY)?.filter(|k| !k.is_empty()))
    }

    /// Binds `license_key` to this device.
    ///
    /// The verification record is persisted before this returns.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::Validation`] for an empty key; nothing is sent.
    /// - [`LicenseError::Service`] with the service's message on refusal.
    /// - [`LicenseError::Network`] on transport failure.
    pub async fn login(&mut self, license_key: &str) -> LicenseResult<VerifyInfo> {
        let license_key = license_key.trim();
        if license_key.is_empty() {
            return Err(LicenseError::Validation("license key is empty".to_string()));
        }

        self.transition(SessionState::Verifying);
        match self.request_login(license_key).await {
            Ok(info) => {
                self.transition(SessionState::Verified(info.clone()));
                Ok(info)
            }
            Err(err) => {
                warn!("login with {} failed: {err}", mask_key(license_key));
                self.transition(SessionState::Unverified);
                Err(err)
            }
        }
    }

    async fn request_login(&mut self, license_key: &str) -> LicenseResult<VerifyInfo> {
        let device_code = self.device_code()?;
        let request = LoginRequest {
            license_key: license_key.to_string(),
            device_code,
            timestamp: self.clock.now_secs(),
        };
        debug!(
            "login {} via {} transport",
            mask_key(license_key),
            self.transport.name()
        );

        let grant = self.transport.login(&request).await?.into_result()?;

        let info = VerifyInfo::new(license_key, grant.vip_expire_time, self.clock.now_secs());
        if let Err(err) = self.persist(&info) {
            if let Err(evict_err) = self.evict() {
                warn!("could not roll back partial login state: {evict_err}");
            }
            return Err(err);
        }
        self.last_auth = Some(CardAuthResult::from(&grant));

        info!(
            "license {} verified until {}",
            mask_key(license_key),
            info.vip_expire_time
        );
        Ok(info)
    }

    /// Releases this device's binding and clears the local cache.
    ///
    /// The cache is only cleared when the service confirms the unbind.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Validation`] if no key was saved locally; otherwise as
    /// for [`login`](Self::login).
    pub async fn unbind(&mut self) -> LicenseResult<String> {
        let license_key = match self.saved_license_key()? {
            Some(key) => key,
            None => self
                .read_cached()?
                .map(|info| info.license_key)
                .ok_or_else(|| LicenseError::Validation("no saved license key to unbind".to_string()))?,
        };

        let request = UnbindRequest {
            license_key: license_key.clone(),
            device_code: self.device_code()?,
            timestamp: self.clock.now_secs(),
        };
        debug!(
            "unbind {} via {} transport",
            mask_key(&license_key),
            self.transport.name()
        );

        let message = self.transport.unbind(&request).await?.into_result()?;

        self.evict()?;
        self.last_auth = None;
        self.transition(SessionState::Unverified);
        info!("license {} unbound", mask_key(&license_key));
        Ok(message)
    }

    /// Returns the cached record if it has not expired. No network call.
    ///
    /// An expired or unreadable record is evicted and reported as absent.
    /// Expiry at exactly "now" counts as expired.
    pub fn check_local_verify(&mut self) -> LicenseResult<Option<VerifyInfo>> {
        let Some(info) = self.read_cached()? else {
            if self.state.is_verified() {
                self.transition(SessionState::Unverified);
            }
            return Ok(None);
        };

        let now = self.clock.now_secs();
        if info.is_expired_at(now) {
            self.transition(SessionState::Expired);
            self.evict()?;
            self.transition(SessionState::Unverified);
            return Ok(None);
        }

        self.transition(SessionState::Verified(info.clone()));
        Ok(Some(info))
    }

    /// Fetches the service announcement.
    ///
    /// `Ok("")` means the service has no announcement; `Err` means the fetch
    /// itself failed.
    pub async fn notice(&self) -> LicenseResult<String> {
        self.transport.notice().await?.into_result()
    }

    /// Time left until `expire_epoch_secs`.
    #[must_use]
    pub fn remaining_time(&self, expire_epoch_secs: i64) -> RemainingTime {
        RemainingTime::between(self.clock.now_secs(), expire_epoch_secs)
    }

    /// Drops the cached record and saved key without contacting the service.
    pub fn clear_local(&mut self) -> LicenseResult<()> {
        self.evict()?;
        self.last_auth = None;
        self.transition(SessionState::Unverified);
        Ok(())
    }

    fn read_cached(&self) -> LicenseResult<Option<VerifyInfo>> {
        let Some(raw) = self.store.get(VERIFY_INFO_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<VerifyInfo>(&raw) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                warn!("discarding unreadable verification record: {e}");
                self.evict()?;
                Ok(None)
            }
        }
    }

    /// The verification record is written last; its presence is what marks
    /// the session as verified.
    fn persist(&self, info: &VerifyInfo) -> LicenseResult<()> {
        let record = serde_json::to_string(info)?;
        self.store.set(SAVED_KEY_KEY, &info.license_key)?;
        self.store.set(VERIFY_INFO_KEY, &record)
    }

    fn evict(&self) -> LicenseResult<()> {
        self.store.remove(VERIFY_INFO_KEY)?;
        self.store.remove(SAVED_KEY_KEY)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.label() != next.label() {
            info!("license session {} -> {}", self.state.label(), next.label());
        }
        self.state = next;
    }
}

impl std::fmt::Debug for LicenseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseSession")
            .field("transport", &self.transport.name())
            .field("state", &self.state.label())
            .finish()
    }
}

/// Keeps the first four characters of a key for logs.
fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}****")
}
