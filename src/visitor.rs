//! Persistent visitor identity.
//!
//! The widget identifies its installation with an opaque id created on first
//! launch and reused forever after. Persistence is delegated to a small
//! key-value [`VisitorStore`]; the default store is a JSON object on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{info, warn};

/// Namespace under which the identifier is stored.
pub const VISITOR_KEY: &str = "mokhatt_visitor_id";

#[derive(Debug, Error)]
pub enum VisitorStoreError {
    #[error("visitor store I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("visitor store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Opaque, non-empty visitor identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorId(String);

impl VisitorId {
    /// Wrap an existing identifier. Returns `None` for blank input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        (!raw.trim().is_empty()).then_some(Self(raw))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value persistence used for the visitor identity.
pub trait VisitorStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, VisitorStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), VisitorStoreError>;
}

/// Return the stored identifier, creating and persisting one if absent.
///
/// A store that cannot be read or written still yields a usable id for this
/// process; it just won't survive a restart.
pub fn get_or_create(store: &dyn VisitorStore) -> VisitorId {
    match store.get(VISITOR_KEY) {
        Ok(Some(existing)) => {
            if let Some(id) = VisitorId::new(existing) {
                return id;
            }
            warn!(target: "visitor", "stored visitor id is blank, replacing it");
        }
        Ok(None) => {}
        Err(e) => warn!(target: "visitor", "failed to read visitor id: {e}"),
    }

    let id = VisitorId::generate();
    match store.set(VISITOR_KEY, id.as_str()) {
        Ok(()) => info!(target: "visitor", visitor_id = %id, "created visitor id"),
        Err(e) => warn!(target: "visitor", "visitor id will not persist: {e}"),
    }
    id
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Stores all keys in a single JSON object file.
pub struct FileVisitorStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl FileVisitorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, VisitorStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(VisitorStoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| VisitorStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl VisitorStore for FileVisitorStore {
    fn get(&self, key: &str) -> Result<Option<String>, VisitorStoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VisitorStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A corrupt file is replaced rather than blocking the write.
        let mut all = self.read_all().unwrap_or_default();
        all.insert(key.to_string(), value.to_string());

        let io_err = |source: std::io::Error| VisitorStoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&all).map_err(|source| {
            VisitorStoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

/// In-memory store, for hosts without a writable data directory and for tests.
#[derive(Default)]
pub struct MemoryVisitorStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl VisitorStore for MemoryVisitorStore {
    fn get(&self, key: &str) -> Result<Option<String>, VisitorStoreError> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VisitorStoreError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(VisitorId::new("").is_none());
        assert!(VisitorId::new("  ").is_none());
        assert_eq!(VisitorId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn id_is_created_once_and_reused() {
        let store = MemoryVisitorStore::default();
        let first = get_or_create(&store);
        let second = get_or_create(&store);
        assert_eq!(first, second);
        assert!(!first.as_str().is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/visitor.json");

        let first = get_or_create(&FileVisitorStore::new(&path));
        let second = get_or_create(&FileVisitorStore::new(&path));

        assert_eq!(first, second);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(VISITOR_KEY));
        assert!(raw.contains(first.as_str()));
    }

    #[test]
    fn file_store_keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVisitorStore::new(dir.path().join("visitor.json"));
        store.set("other", "1").unwrap();
        store.set(VISITOR_KEY, "v-1").unwrap();
        assert_eq!(store.get("other").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get(VISITOR_KEY).unwrap().as_deref(), Some("v-1"));
    }

    #[test]
    fn corrupt_file_is_replaced_with_a_fresh_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visitor.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileVisitorStore::new(&path);

        assert!(matches!(
            store.get(VISITOR_KEY),
            Err(VisitorStoreError::Corrupt { .. })
        ));
        let id = get_or_create(&store);
        assert_eq!(store.get(VISITOR_KEY).unwrap(), Some(id.to_string()));
    }
}
