//! Durable key-value state used to throttle update checks.
//!
//! The poller reads and writes a single key, [`LAST_UPDATE_CHECK_KEY`], as
//! epoch milliseconds. Hosts can plug in their own store; [`JsonStateStore`]
//! keeps the values in a JSON object on disk.

use crate::error::{ExtensionError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key holding the epoch-millisecond timestamp of the last update check.
pub const LAST_UPDATE_CHECK_KEY: &str = "lastUpdateCheck";

/// Host-owned durable key-value storage.
pub trait StateStore: Send + Sync {
    /// Read an integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set_i64(&self, key: &str, value: i64) -> Result<()>;
}

/// JSON-file backed store. Values from other writers are preserved.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonStateStore {
    /// Open the store at `path`. A missing or unparsable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok())
            .unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Open the store at the default location ([`crate::paths::state_file`]).
    pub fn open_default() -> Self {
        Self::open(crate::paths::state_file())
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| ExtensionError::Persistence(format!("cannot serialize state: {e}")))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

impl StateStore for JsonStateStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).and_then(Value::as_i64))
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), Value::from(value));
        self.persist(&values)
    }
}

/// Write `bytes` to `path` via a temp file, fsync and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ExtensionError::Persistence(format!(
                "cannot create state directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        ExtensionError::Persistence(format!("cannot create {}: {e}", tmp_path.display()))
    })?;
    file.write_all(bytes)
        .map_err(|e| ExtensionError::Persistence(format!("cannot write state: {e}")))?;
    file.sync_all()
        .map_err(|e| ExtensionError::Persistence(format!("cannot sync state: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        ExtensionError::Persistence(format!(
            "cannot rename {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

/// In-memory store, for hosts without durable storage and for tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).copied())
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }
}
