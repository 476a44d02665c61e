//! Configuration and reporting for the `kami` command-line client.

use anyhow::{Context, Result};
use kami_license::{
    format_expire_time, FileStore, LegacyApiConfig, LegacyHttpTransport, LicenseResult,
    LicenseSession, LicenseTransport, ProxyConfig, ProxyTransport, SessionState,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Which transport strategy talks to the license service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Direct to the legacy server, parameters RC4-obfuscated.
    #[default]
    Legacy,
    /// Through the trusted local backend, parameters in the clear.
    Proxy,
}

/// Client configuration, read from a JSON file. Missing fields take defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub transport: TransportKind,
    pub legacy: LegacyApiConfig,
    pub proxy: ProxyConfig,
    /// Overrides the platform default store location.
    pub store_path: Option<PathBuf>,
}

impl CliConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Builds the configured transport.
    pub fn build_transport(&self) -> LicenseResult<Arc<dyn LicenseTransport>> {
        let transport: Arc<dyn LicenseTransport> = match self.transport {
            TransportKind::Legacy => Arc::new(LegacyHttpTransport::new(self.legacy.clone())?),
            TransportKind::Proxy => Arc::new(ProxyTransport::new(self.proxy.clone())?),
        };
        Ok(transport)
    }

    /// Opens the configured store, or the platform default.
    pub fn open_store(&self) -> Result<Arc<FileStore>> {
        let store = match &self.store_path {
            Some(path) => FileStore::open(path),
            None => FileStore::open_default(),
        }
        .context("Failed to open license store")?;
        Ok(Arc::new(store))
    }

    /// Opens the store and builds a session over the configured transport.
    pub fn session(&self) -> Result<LicenseSession> {
        let store = self.open_store()?;
        let transport = self
            .build_transport()
            .context("Failed to build license transport")?;
        Ok(LicenseSession::new(store, transport))
    }
}

/// Snapshot of the local license state, as printed by `kami status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: SessionState,
    pub device_code: String,
    pub license_key: Option<String>,
    pub vip_expire_time: Option<i64>,
    pub expires: Option<String>,
    pub remaining: Option<String>,
}

impl StatusReport {
    /// Reads local state only; expired records are evicted on the way.
    pub fn collect(session: &mut LicenseSession) -> LicenseResult<Self> {
        let device_code = session.device_code()?;
        let info = session.check_local_verify()?;
        Ok(Self {
            state: session.state().clone(),
            device_code,
            license_key: info.as_ref().map(|i| i.license_key.clone()),
            vip_expire_time: info.as_ref().map(|i| i.vip_expire_time),
            expires: info.as_ref().and_then(|i| format_expire_time(i.vip_expire_time)),
            remaining: info
                .as_ref()
                .map(|i| session.remaining_time(i.vip_expire_time).to_string()),
        })
    }

    /// Human-readable multi-line rendering.
    pub fn render(&self) -> String {
        let mut out = format!("Device code: {}\n", self.device_code);
        match (&self.license_key, &self.expires, &self.remaining) {
            (Some(key), expires, remaining) => {
                out.push_str(&format!("License:     {key}\n"));
                out.push_str(&format!(
                    "Expires:     {}\n",
                    expires.as_deref().unwrap_or("-")
                ));
                out.push_str(&format!(
                    "Remaining:   {}\n",
                    remaining.as_deref().unwrap_or("-")
                ));
            }
            (None, _, _) => out.push_str("License:     not verified\n"),
        }
        out
    }
}
