//! Settings persistence.

use super::Settings;
use crate::database::schema::SETTINGS_KEY;
use crate::database::Database;
use crate::device::DeviceIdentity;
use crate::{IcloodError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Persistent key/value storage for [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Load stored settings. `Ok(None)` means nothing was stored yet.
    fn load(&self) -> Result<Option<Settings>>;

    /// Replace the stored settings.
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings stored as a JSON document in the local SQLite database.
pub struct SqliteSettingsStore {
    db: Mutex<Database>,
}

impl SqliteSettingsStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::open(path)?;
        db.initialize_schema()?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Store backed by an in-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        let db = Database::in_memory()?;
        db.initialize_schema()?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Load the device identity kept next to the settings, creating it on first run.
    pub fn device_identity(&self) -> Result<DeviceIdentity> {
        let db = self.lock()?;
        DeviceIdentity::load_or_create(&db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| IcloodError::Persistence("settings database lock poisoned".to_string()))
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<Option<Settings>> {
        let db = self.lock()?;
        match db.get_value(SETTINGS_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| IcloodError::Persistence(format!("Corrupt settings: {}", e))),
            None => Ok(None),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)
            .map_err(|e| IcloodError::Persistence(e.to_string()))?;
        let db = self.lock()?;
        db.put_value(SETTINGS_KEY, &json)
            .map_err(|e| IcloodError::Persistence(e.to_string()))
    }
}

/// Volatile store; can be told to fail for exercising error paths.
#[derive(Default)]
pub struct MemorySettingsStore {
    value: Mutex<Option<Settings>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `settings`.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            value: Mutex::new(Some(settings)),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved value.
    pub fn stored(&self) -> Option<Settings> {
        self.value.lock().ok().and_then(|v| v.clone())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<Settings>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(IcloodError::Persistence("read failed".to_string()));
        }
        Ok(self.stored())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IcloodError::Persistence("write failed".to_string()));
        }
        let mut value = self
            .value
            .lock()
            .map_err(|_| IcloodError::Persistence("settings lock poisoned".to_string()))?;
        *value = Some(settings.clone());
        Ok(())
    }
}
