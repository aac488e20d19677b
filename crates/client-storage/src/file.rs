//! File-backed storage.
//!
//! Persists all keys as one JSON object. Every mutation rewrites the
//! whole file through a temp file followed by a rename, so a reader
//! never observes a partially written store even if the process dies
//! mid-write.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// File-backed key-value storage with atomic whole-file writes.
pub struct FileStorage {
    path: PathBuf,
    /// Serializes writers; the cached map is the single source of truth
    /// between flushes.
    state: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let state = Self::load(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn load(path: &Path) -> StorageResult<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupt store is unreadable data, not a crash; the
                // caller will simply find nothing and re-authenticate.
                warn!(path = %path.display(), error = %e, "Credential file is corrupt, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    fn flush(&self, state: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::Platform(format!("atomic rename failed: {}", e)))?;

        Ok(())
    }
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(key.to_string(), value.to_string());
        self.flush(&state)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut state = self.state.lock().unwrap();
        let existed = state.remove(key).is_some();
        if existed {
            self.flush(&state)?;
        }
        Ok(existed)
    }
}
