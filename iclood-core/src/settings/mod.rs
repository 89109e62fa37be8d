//! User-facing client settings: the backup server target and backup policy.

pub mod store;
pub mod validate;

pub use store::{MemorySettingsStore, SettingsStore, SqliteSettingsStore};
pub use validate::{validate_port, validate_server_address};

use serde::{Deserialize, Serialize};

/// Default server port.
pub const DEFAULT_PORT: &str = "8080";

/// Persisted client settings.
///
/// Unknown or missing fields fall back to their defaults when loading, so
/// older stored documents keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IP address, host name or URL of the backup server.
    pub server_address: String,
    pub server_port: String,
    pub auto_backup: bool,
    pub wifi_only_backup: bool,
    pub charging_only_backup: bool,
    /// Percentage of server storage after which a warning is shown.
    pub storage_limit: u8,
    pub original_quality: bool,
    pub background_refresh: bool,
    pub refresh_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            server_port: DEFAULT_PORT.to_string(),
            auto_backup: true,
            wifi_only_backup: true,
            charging_only_backup: false,
            storage_limit: 99,
            original_quality: true,
            background_refresh: true,
            refresh_interval_minutes: 60,
        }
    }
}

impl Settings {
    /// Merge a partial update into a copy of these settings.
    pub fn apply(&self, patch: &SettingsPatch) -> Self {
        let mut merged = self.clone();
        if let Some(address) = &patch.server_address {
            merged.server_address = address.clone();
        }
        if let Some(port) = &patch.server_port {
            merged.server_port = port.clone();
        }
        if let Some(v) = patch.auto_backup {
            merged.auto_backup = v;
        }
        if let Some(v) = patch.wifi_only_backup {
            merged.wifi_only_backup = v;
        }
        if let Some(v) = patch.charging_only_backup {
            merged.charging_only_backup = v;
        }
        if let Some(v) = patch.storage_limit {
            merged.storage_limit = v;
        }
        if let Some(v) = patch.original_quality {
            merged.original_quality = v;
        }
        if let Some(v) = patch.background_refresh {
            merged.background_refresh = v;
        }
        if let Some(v) = patch.refresh_interval_minutes {
            merged.refresh_interval_minutes = v;
        }
        merged
    }

    /// Whether a server address has been configured at all.
    pub fn has_server(&self) -> bool {
        !self.server_address.trim().is_empty()
    }

    /// Whether the server endpoint differs between two settings values.
    pub fn endpoint_differs(&self, other: &Settings) -> bool {
        self.server_address != other.server_address || self.server_port != other.server_port
    }
}

/// A partial settings update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub server_address: Option<String>,
    pub server_port: Option<String>,
    pub auto_backup: Option<bool>,
    pub wifi_only_backup: Option<bool>,
    pub charging_only_backup: Option<bool>,
    pub storage_limit: Option<u8>,
    pub original_quality: Option<bool>,
    pub background_refresh: Option<bool>,
    pub refresh_interval_minutes: Option<u32>,
}

impl SettingsPatch {
    /// Patch that only changes the server endpoint.
    pub fn endpoint(address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            server_address: Some(address.into()),
            server_port: Some(port.into()),
            ..Default::default()
        }
    }

    /// Whether this patch sets the server address or port.
    pub fn touches_endpoint(&self) -> bool {
        self.server_address.is_some() || self.server_port.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
