//! Key-value persistence for knowledge payloads.
//!
//! Keys are `rl_knowledge_{type}` (see [`EntityTypeId::storage_key`]) and
//! values are JSON payload text. Backends never panic on I/O failure; the
//! registry logs and continues.
//!
//! [`EntityTypeId::storage_key`]: skirmish_common::EntityTypeId::storage_key

use parking_lot::Mutex;
use skirmish_common::StoreError;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Persistent key-value backend.
pub trait KnowledgeStore: Send + Sync {
    /// Reads the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `payload` under `key`, replacing any previous value.
    fn set(&self, key: &str, payload: &str) -> Result<(), StoreError>;
}

/// In-memory store, useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KnowledgeStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), payload.to_string());
        Ok(())
    }
}

/// Directory-backed store, one `{key}.json` file per key.
///
/// Writes go to a temporary file which is then renamed over the target, so a
/// reader never observes a partially written payload.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!("Opened knowledge store at {}", dir.display());
        Ok(Self { dir })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KnowledgeStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let temp = path.with_extension("json.tmp");

        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &path)?;

        trace!(bytes = payload.len(), "Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("rl_knowledge_grunt").expect("get"), None);

        store.set("rl_knowledge_grunt", "{}").expect("set");
        store.set("rl_knowledge_grunt", "{\"a\":1}").expect("overwrite");

        assert_eq!(
            store.get("rl_knowledge_grunt").expect("get").as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("knowledge")).expect("open");

        assert_eq!(store.get("rl_knowledge_archer").expect("get"), None);
        store.set("rl_knowledge_archer", "payload-1").expect("set");
        store.set("rl_knowledge_archer", "payload-2").expect("set");

        assert_eq!(
            store.get("rl_knowledge_archer").expect("get").as_deref(),
            Some("payload-2")
        );
        assert!(store.dir().join("rl_knowledge_archer.json").exists());
        assert!(!store.dir().join("rl_knowledge_archer.json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        for key in ["", "../escape", "a/b", "spaced key"] {
            assert!(matches!(
                store.set(key, "x"),
                Err(StoreError::InvalidKey(_))
            ));
            assert!(matches!(store.get(key), Err(StoreError::InvalidKey(_))));
        }
    }

    #[test]
    fn test_stores_are_object_safe() {
        let stores: Vec<Box<dyn KnowledgeStore>> = vec![Box::new(MemoryStore::new())];
        for store in &stores {
            store.set("k", "v").expect("set");
            assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));
        }
    }
}
