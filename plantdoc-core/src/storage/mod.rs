//! Key-value persistence behind one interface
//!
//! The history record lives under a single key. Which backend holds it is
//! chosen once at startup from [`StorageConfig`]; everything above this
//! module only sees [`KeyValueStore`].
//!
//! | Backend | Location | Notes |
//! |---------|----------|-------|
//! | [`SqliteStore`] | `$XDG_DATA_HOME/plantdoc/history.db` | default |
//! | [`FileStore`] | `$XDG_DATA_HOME/plantdoc/history/` | one JSON file per key |
//! | [`MemoryStore`] | process memory | lost on exit |

mod file;
mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

pub use file::FileStore;
pub use sqlite::SqliteStore;

/// String-keyed, string-valued persistent storage.
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Read the value stored under `key`; `None` if it was never set
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Open the backend selected by configuration.
pub fn open(config: &StorageConfig) -> Result<Box<dyn KeyValueStore>> {
    let store: Box<dyn KeyValueStore> = match (config.backend, config.resolved_path()) {
        (StorageBackend::Memory, _) => Box::new(MemoryStore::new()),
        (StorageBackend::Sqlite, Some(path)) => Box::new(SqliteStore::open(&path)?),
        (StorageBackend::File, Some(path)) => Box::new(FileStore::open(&path)?),
        (backend, None) => {
            return Err(Error::Config(format!(
                "no storage path resolved for {:?} backend",
                backend
            )))
        }
    };

    tracing::debug!(backend = store.name(), "Opened history storage");
    Ok(store)
}

/// In-process store; used for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
