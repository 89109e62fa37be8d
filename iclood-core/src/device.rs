//! Device identity: the stable id the server uses to track what this device
//! has already backed up or ignored.

use crate::database::schema::DEVICE_KEY;
use crate::database::Database;
use crate::platform::default_device_name;
use crate::{IcloodError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A device identity: stable id plus a human readable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: Uuid,
    pub device_name: String,
}

impl DeviceIdentity {
    /// Generate a new device identity with a fresh id.
    pub fn generate(device_name: &str) -> Self {
        Self {
            device_id: Uuid::new_v4(),
            device_name: device_name.to_string(),
        }
    }

    /// Store the identity in the database.
    pub fn save_to_db(&self, db: &Database) -> Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| IcloodError::Persistence(format!("Invalid device identity: {}", e)))?;
        db.put_value(DEVICE_KEY, &json)
    }

    /// Load the device identity from the database.
    pub fn load_from_db(db: &Database) -> Result<Option<Self>> {
        match db.get_value(DEVICE_KEY)? {
            Some(json) => {
                let identity = serde_json::from_str(&json).map_err(|e| {
                    IcloodError::Persistence(format!("Corrupt device identity: {}", e))
                })?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    /// Load the stored identity, creating and persisting one on first run.
    pub fn load_or_create(db: &Database) -> Result<Self> {
        if let Some(identity) = Self::load_from_db(db)? {
            return Ok(identity);
        }

        let identity = Self::generate(&default_device_name());
        identity.save_to_db(db)?;
        info!(
            "Registered new device identity {} ({})",
            identity.device_id, identity.device_name
        );
        Ok(identity)
    }

    /// The value sent as `device_id` on every `/photos/*` request.
    pub fn wire_id(&self) -> String {
        self.device_id.to_string()
    }
}
