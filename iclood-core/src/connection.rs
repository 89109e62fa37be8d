//! Connection state: persisted server settings plus the live reachability flag.
//!
//! The manager is an explicitly owned object; components that need the
//! server address or the reachability gate hold an `Arc<ConnectionManager>`
//! and observe changes through `watch` subscriptions.

use crate::client::BackupClient;
use crate::device::DeviceIdentity;
use crate::settings::{Settings, SettingsPatch, SettingsStore};
use crate::{IcloodError, Result};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Timeout for the `/ping` reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Build the server base URL from the configured address and port.
///
/// `http://` is prefixed when the address carries no scheme and `:port` is
/// appended unless the address already contains it.
pub fn normalize_server_url(address: &str, port: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    let port = port.trim();

    let mut url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    if !port.is_empty() && !url.contains(&format!(":{}", port)) {
        url = format!("{}:{}", url, port);
    }
    url
}

/// Owns the client settings and whether the configured server answers.
pub struct ConnectionManager {
    store: Arc<dyn SettingsStore>,
    device: DeviceIdentity,
    http: reqwest::Client,
    probe_timeout: Duration,
    settings: watch::Sender<Settings>,
    reachable: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Create a manager with default settings; call [`load`](Self::load) to restore saved ones.
    pub fn new(store: Arc<dyn SettingsStore>, device: DeviceIdentity) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let (settings, _) = watch::channel(Settings::default());
        let (reachable, _) = watch::channel(false);

        Ok(Self {
            store,
            device,
            http,
            probe_timeout: PROBE_TIMEOUT,
            settings,
            reachable,
        })
    }

    /// Override the reachability probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Restore settings from the store.
    ///
    /// Missing settings leave the defaults in place. A store failure keeps
    /// the defaults too and is returned as [`IcloodError::Persistence`].
    pub async fn load(&self) -> Result<()> {
        let loaded = match self.store.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No saved settings, using defaults");
                return Ok(());
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
                return Err(Self::persistence(e));
            }
        };

        let previous = self.settings.send_replace(loaded.clone());
        if loaded.endpoint_differs(&previous) {
            self.check_reachable().await;
        }
        Ok(())
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Last known reachability of the server.
    pub fn is_reachable(&self) -> bool {
        *self.reachable.borrow()
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<Settings> {
        self.settings.subscribe()
    }

    pub fn subscribe_reachability(&self) -> watch::Receiver<bool> {
        self.reachable.subscribe()
    }

    /// Merge `patch` into the current settings, notify observers and persist.
    ///
    /// The in-memory settings are updated even if persisting fails; the
    /// failure is then returned as [`IcloodError::Persistence`]. A change of
    /// address or port re-probes the server.
    pub async fn update(&self, patch: SettingsPatch) -> Result<()> {
        let current = self.settings();
        let merged = current.apply(&patch);
        let endpoint_changed = merged.endpoint_differs(&current);

        self.settings.send_replace(merged.clone());
        let saved = self.store.save(&merged).map_err(|e| {
            error!("Failed to save settings: {}", e);
            Self::persistence(e)
        });

        if endpoint_changed {
            self.check_reachable().await;
        }
        saved
    }

    /// Restore default settings and persist them.
    pub async fn reset(&self) -> Result<()> {
        let defaults = Settings::default();
        let previous = self.settings.send_replace(defaults.clone());
        let saved = self.store.save(&defaults).map_err(|e| {
            error!("Failed to reset settings: {}", e);
            Self::persistence(e)
        });

        if defaults.endpoint_differs(&previous) {
            self.check_reachable().await;
        }
        saved
    }

    /// Probe `<server>/ping` and update the shared reachability flag.
    ///
    /// Returns `true` only for an HTTP 200 received within the probe
    /// timeout. Every other outcome, including a missing address, is `false`.
    pub async fn check_reachable(&self) -> bool {
        let reachable = match self.client() {
            None => false,
            Some(client) => match client.ping(self.probe_timeout).await {
                Ok(status) if status == StatusCode::OK => true,
                Ok(status) => {
                    warn!("Server ping to {} returned {}", client.base_url(), status);
                    false
                }
                Err(e) => {
                    warn!("Server connection check failed: {}", e);
                    false
                }
            },
        };

        let previous = self.reachable.send_replace(reachable);
        if previous != reachable {
            info!(
                "Server is now {}",
                if reachable { "reachable" } else { "unreachable" }
            );
        }
        reachable
    }

    /// Normalized base URL of the configured server, if any.
    pub fn base_url(&self) -> Option<String> {
        let settings = self.settings.borrow();
        settings
            .has_server()
            .then(|| normalize_server_url(&settings.server_address, &settings.server_port))
    }

    /// HTTP client bound to the configured server and this device.
    pub fn client(&self) -> Option<BackupClient> {
        self.base_url().map(|url| {
            BackupClient::with_http(self.http.clone(), &url, &self.device.wire_id())
        })
    }

    fn persistence(e: IcloodError) -> IcloodError {
        match e {
            IcloodError::Persistence(_) => e,
            other => IcloodError::Persistence(other.to_string()),
        }
    }
}
