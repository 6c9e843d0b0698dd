//! Local state file: a simulated secret store, database servers and instance
//! inventory persisted as one JSON document.

use std::fs;
use std::path::Path;

use mariadb_rotation::{
    DatabaseSnapshot, InMemoryDatabase, InMemorySecretStore, StaticInventory, StoreSnapshot,
};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Everything the rotation touches, in serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalState {
    /// Secret store contents.
    #[serde(default)]
    pub secrets: StoreSnapshot,
    /// Database servers keyed by host.
    #[serde(default)]
    pub database: DatabaseSnapshot,
    /// Instance inventory used for replica checks.
    #[serde(default)]
    pub inventory: StaticInventory,
}

impl LocalState {
    /// Reads a state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid state document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| CliError::File {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| CliError::InvalidState {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Writes the state file, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CliError::Format(format!("state serialization failed: {e}")))?;
        fs::write(path, content).map_err(|source| CliError::File {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Splits the state into live collaborators.
    #[must_use]
    pub fn into_live(self) -> LiveState {
        LiveState {
            store: InMemorySecretStore::from_snapshot(self.secrets),
            database: InMemoryDatabase::from_snapshot(self.database),
            inventory: self.inventory,
        }
    }
}

/// Collaborators built from a [`LocalState`].
#[derive(Debug)]
pub struct LiveState {
    /// Secret store.
    pub store: InMemorySecretStore,
    /// Database servers.
    pub database: InMemoryDatabase,
    /// Instance inventory.
    pub inventory: StaticInventory,
}

impl LiveState {
    /// Captures the collaborators back into a persistable state.
    #[must_use]
    pub fn snapshot(&self) -> LocalState {
        LocalState {
            secrets: self.store.snapshot(),
            database: self.database.snapshot(),
            inventory: self.inventory.clone(),
        }
    }
}
