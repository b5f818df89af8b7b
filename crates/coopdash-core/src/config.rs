//! Client configuration and durable storage.
//!
//! This module provides:
//! - `ClientStorage`, the durable key-value store the dashboard persists its
//!   access level and theme preference into
//! - `MemoryStorage` for tests and `FileStorage` for Linux (`~/.coopdash/`)
//! - `DashboardSettings`, the JSON settings file
//!
//! Storage is synchronous so the same code runs on any runtime.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

/// Storage key for the cached access level.
pub const ACCESS_LEVEL_KEY: &str = "accessLevel";

/// Storage key for the UI theme.
pub const THEME_PREFERENCE_KEY: &str = "themePreference";

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration was not found.
    #[error("Configuration not found: {0}")]
    NotFound(String),
    /// Failed to read configuration.
    #[error("Read error: {0}")]
    ReadError(String),
    /// Failed to write configuration.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Configuration data is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Storage is not available.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Durable client-side string storage.
pub trait ClientStorage: Send + Sync {
    /// Read a value by key.
    fn get_item(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Write a value by key.
    fn set_item(&self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Delete a key.
    fn remove_item(&self, key: &str) -> Result<(), ConfigError>;
}

/// UI theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
        }
    }

    /// Load the stored theme; unknown or missing values give `Light`.
    pub fn load(storage: &dyn ClientStorage) -> Self {
        match storage.get_item(THEME_PREFERENCE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_default(),
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read theme preference: {}", e);
                Self::default()
            }
        }
    }

    pub fn store(&self, storage: &dyn ClientStorage) -> Result<(), ConfigError> {
        storage.set_item(THEME_PREFERENCE_KEY, self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            other => Err(ConfigError::InvalidData(format!("unknown theme {other:?}"))),
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Storage implementations
// ============================================================================

/// In-memory storage, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let data = self
            .data
            .read()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        data.remove(key);
        Ok(())
    }
}

/// Storage persisted as a flat JSON object in a single file.
///
/// Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ConfigError::InvalidData(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ConfigError::ReadError(format!("{}: {}", path.display(), e))),
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", self.path.display(), e)))
    }
}

impl ClientStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let data = self
            .data
            .read()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        data.insert(key.to_string(), value.to_string());
        self.flush(&data)
    }

    fn remove_item(&self, key: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::StorageUnavailable("lock poisoned".to_string()))?;
        if data.remove(key).is_some() {
            self.flush(&data)?;
        }
        Ok(())
    }
}

// ============================================================================
// Dashboard settings
// ============================================================================

/// Device address used when nothing else is configured.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.1.1";

/// How overlapping access level responses are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseOrdering {
    /// Whichever response resolves last is applied.
    #[default]
    LastResolvedWins,
    /// Responses to requests older than the newest applied one are dropped.
    LatestRequestWins,
}

/// Dashboard settings file (`~/.coopdash/settings.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    /// Base URL of the device web server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_url: Option<String>,

    /// Seconds between access level refreshes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_refresh_secs: Option<u64>,

    /// Poll period for views that do not declare their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_fetch_period_ms: Option<u64>,

    /// Per-request timeout. Unset means requests may hang indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Ordering policy for overlapping access level refreshes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ordering: Option<ResponseOrdering>,

    /// Where the durable client storage file lives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl DashboardSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.display().to_string())
            } else {
                ConfigError::ReadError(format!("{}: {}", path.display(), e))
            }
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidData(format!("{}: {}", path.display(), e)))
    }

    /// Load settings, falling back to defaults when the file is missing.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn device_url(&self) -> String {
        self.device_url
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE_URL.to_string())
    }

    /// Zero is treated as unset.
    pub fn access_refresh_interval(&self) -> Duration {
        let secs = self.access_refresh_secs.filter(|s| *s > 0).unwrap_or(10);
        Duration::from_secs(secs)
    }

    pub fn default_fetch_period(&self) -> Duration {
        Duration::from_millis(self.default_fetch_period_ms.unwrap_or(1000))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn response_ordering(&self) -> ResponseOrdering {
        self.response_ordering.unwrap_or_default()
    }

    /// Storage file path, `<config dir>/storage.json` unless overridden.
    pub fn storage_path(&self, config_dir: &Path) -> PathBuf {
        self.storage_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("storage.json"))
    }
}

/// Default configuration directory, `$HOME/.coopdash`.
pub fn default_config_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".coopdash")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("coopdash-test-{}-{}", std::process::id(), name))
            .join("storage.json")
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item(ACCESS_LEVEL_KEY).unwrap(), None);

        storage.set_item(ACCESS_LEVEL_KEY, "1").unwrap();
        assert_eq!(storage.get_item(ACCESS_LEVEL_KEY).unwrap().as_deref(), Some("1"));

        storage.remove_item(ACCESS_LEVEL_KEY).unwrap();
        assert_eq!(storage.get_item(ACCESS_LEVEL_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_open() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item(ACCESS_LEVEL_KEY, "1").unwrap();
        storage.set_item(THEME_PREFERENCE_KEY, "dark").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item(ACCESS_LEVEL_KEY).unwrap().as_deref(), Some("1"));
        assert_eq!(ThemePreference::load(&reopened), ThemePreference::Dark);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let path = temp_path("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(FileStorage::open(&path), Err(ConfigError::InvalidData(_))));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_theme_defaults_to_light() {
        let storage = MemoryStorage::new();
        assert_eq!(ThemePreference::load(&storage), ThemePreference::Light);

        storage.set_item(THEME_PREFERENCE_KEY, "purple").unwrap();
        assert_eq!(ThemePreference::load(&storage), ThemePreference::Light);

        ThemePreference::Dark.store(&storage).unwrap();
        assert_eq!(
            storage.get_item(THEME_PREFERENCE_KEY).unwrap().as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings = DashboardSettings::default();
        assert_eq!(settings.device_url(), DEFAULT_DEVICE_URL);
        assert_eq!(settings.access_refresh_interval(), Duration::from_secs(10));
        assert_eq!(settings.default_fetch_period(), Duration::from_millis(1000));
        assert_eq!(settings.request_timeout(), None);
        assert_eq!(settings.response_ordering(), ResponseOrdering::LastResolvedWins);
    }

    #[test]
    fn test_settings_parse_camel_case() {
        let settings: DashboardSettings = serde_json::from_str(
            r#"{"deviceUrl":"http://coop.local","accessRefreshSecs":5,"responseOrdering":"latestRequestWins"}"#,
        )
        .unwrap();
        assert_eq!(settings.device_url(), "http://coop.local");
        assert_eq!(settings.access_refresh_interval(), Duration::from_secs(5));
        assert_eq!(settings.response_ordering(), ResponseOrdering::LatestRequestWins);
    }

    #[test]
    fn test_zero_refresh_interval_uses_default() {
        let settings: DashboardSettings =
            serde_json::from_str(r#"{"accessRefreshSecs":0}"#).unwrap();
        assert_eq!(settings.access_refresh_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_settings_missing_file_is_default() {
        let path = temp_path("missing-settings");
        let settings = DashboardSettings::load_or_default(&path).unwrap();
        assert!(settings.device_url.is_none());
    }
}
