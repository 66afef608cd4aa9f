//! Durable key-value storage for the ledger
//!
//! Values are stored as JSON documents. Reads are forgiving: a missing or
//! unreadable value is reported as absent and the caller falls back to its
//! default. Writes report failures so the caller can log them.
//!
//! The trait is synchronous because the ledger persists while holding its
//! lock. `FileStore` hands its filesystem calls to `block_in_place` on a
//! multi-threaded runtime so other tasks keep their worker.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::runtime::{Handle, RuntimeFlavor};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn read_json(&self, key: &str) -> Option<Value>;

    fn write_json(&self, key: &str, value: &Value) -> StorageResult<()>;

    fn read_int(&self, key: &str) -> Option<i64> {
        self.read_json(key).and_then(|v| v.as_i64())
    }

    fn write_int(&self, key: &str, value: i64) -> StorageResult<()> {
        self.write_json(key, &Value::from(value))
    }
}

fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// One `<key>.json` file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueStore for FileStore {
    fn read_json(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = match run_blocking(|| std::fs::read_to_string(&path)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored value is not valid JSON, ignoring");
                None
            }
        }
    }

    fn write_json(&self, key: &str, value: &Value) -> StorageResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        let data = serde_json::to_vec_pretty(value)?;

        // Write-then-rename keeps the previous value intact if we die mid-write
        run_blocking(|| {
            std::fs::write(&tmp, &data)?;
            std::fs::rename(&tmp, &path)
        })?;
        Ok(())
    }
}

/// Volatile store (tests and ephemeral sessions)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw (possibly malformed) document
    pub fn insert_raw(&self, key: &str, raw: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), raw.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read_json(&self, key: &str) -> Option<Value> {
        let raw = self.raw(key)?;
        serde_json::from_str(&raw).ok()
    }

    fn write_json(&self, key: &str, value: &Value) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.insert_raw(key, &raw);
        Ok(())
    }
}
