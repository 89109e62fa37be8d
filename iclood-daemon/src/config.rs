//! Daemon configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Media library root; the pictures directory when unset.
    pub library_root: Option<PathBuf>,
    /// Settings database; the platform data directory when unset.
    pub database_path: Option<PathBuf>,
    pub page_size: usize,
    /// Device conditions reported to the backup policy.
    pub assume_wifi: bool,
    pub assume_charging: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            library_root: None,
            database_path: None,
            page_size: iclood_core::backup::DEFAULT_PAGE_SIZE,
            assume_wifi: true,
            assume_charging: true,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml_dep::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        Ok(())
    }

    /// `<config dir>/iClood/iclood-daemon.toml`
    pub fn default_path() -> PathBuf {
        iclood_core::platform::get_config_dir().join("iclood-daemon.toml")
    }
}
