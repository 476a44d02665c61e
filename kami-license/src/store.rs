//! Persistent key-value storage for license state.
//!
//! The session manager and device identity provider only see the
//! [`KeyValueStore`] capability. A store is constructed once at startup and
//! shared for the lifetime of the process.
//!
//! # File format
//!
//! [`FileStore`] keeps a single JSON document:
//!
//! ```json
//! {"version":1,"entries":{"device_code":"DEV_…","kami_value":"…"}}
//! ```
//!
//! `version` is bumped whenever the shape of stored values changes.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Current on-disk format version.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Key holding the persisted device code.
pub const DEVICE_CODE_KEY: &str = "device_code";

/// Key holding the license key saved by the last successful login.
pub const SAVED_KEY_KEY: &str = "kami_value";

/// Key holding the serialized verification record.
pub const VERIFY_INFO_KEY: &str = "kami_verify";

/// Minimal key-value capability.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> LicenseResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> LicenseResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> LicenseResult<()>;
}

fn poisoned() -> LicenseError {
    LicenseError::Storage("store lock poisoned".to_string())
}

/// In-memory store, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry, like a user wiping local storage.
    pub fn clear(&self) -> LicenseResult<()> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> LicenseResult<usize> {
        Ok(self.entries.read().map_err(|_| poisoned())?.len())
    }

    pub fn is_empty(&self) -> LicenseResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        Ok(self.entries.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        self.entries.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// JSON-file backed store.
///
/// Every write rewrites the whole file through a temporary sibling and an
/// atomic rename, so a crash never leaves a half-written document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, creating parent directories as needed.
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed, or if its
    /// format version is newer than this build understands.
    pub fn open(path: impl Into<PathBuf>) -> LicenseResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let file: StoreFile = serde_json::from_str(&raw)?;
            if file.version > STORE_FORMAT_VERSION {
                return Err(LicenseError::Storage(format!(
                    "unsupported store format version {} (max {})",
                    file.version, STORE_FORMAT_VERSION
                )));
            }
            file.entries
        } else {
            BTreeMap::new()
        };

        debug!("opened license store at {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Opens the store at the platform default location.
    pub fn open_default() -> LicenseResult<Self> {
        Self::open(default_store_path()?)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk. The in-memory map is only replaced once
    /// this succeeds, so memory never runs ahead of the file.
    fn persist(&self, entries: &BTreeMap<String, String>) -> LicenseResult<()> {
        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        Ok(self.entries.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

/// `<data dir>/kami/storage.json`.
///
/// # Errors
///
/// Returns [`LicenseError::Storage`] when the platform has no data directory.
pub fn default_store_path() -> LicenseResult<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("kami").join("storage.json"))
        .ok_or_else(|| LicenseError::Storage("no platform data directory".to_string()))
}
