//! Database schema and connection management.

use crate::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Current schema version, stored in `PRAGMA user_version`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Key under which the serialized settings are stored.
pub const SETTINGS_KEY: &str = "settings";

/// Key under which the device identity is stored.
pub const DEVICE_KEY: &str = "device";

/// Main database connection and schema manager
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(Self { conn })
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize the database schema
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        self.conn
            .pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
        Ok(())
    }

    /// Read the schema version recorded in the database file.
    pub fn schema_version(&self) -> Result<i32> {
        let version = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Fetch a stored value by key.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a stored value.
    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO app_state (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_sets_schema_version() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        assert_eq!(db.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn initialize_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.put_value(SETTINGS_KEY, "{}").unwrap();
        db.initialize_schema().unwrap();
        assert_eq!(db.get_value(SETTINGS_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn missing_key_returns_none() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        assert!(db.get_value("nope").unwrap().is_none());
    }

    #[test]
    fn put_value_overwrites() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.put_value(DEVICE_KEY, "first").unwrap();
        db.put_value(DEVICE_KEY, "second").unwrap();
        assert_eq!(db.get_value(DEVICE_KEY).unwrap().as_deref(), Some("second"));
    }
}
