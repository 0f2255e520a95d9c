//! Durable key-value storage
//!
//! A small string-keyed store standing in for per-profile browser storage.
//! Values are opaque strings (callers serialize to JSON). `take` reads and
//! removes a key as a single step so a value is delivered at most once.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fd_lock::RwLock;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};

/// String-keyed storage shared by everything running under one profile
pub trait KeyValueStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a key, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Read and delete a key in one step.
    fn take(&self, key: &str) -> StoreResult<Option<String>>;
}

/// In-memory store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key))
    }
}

/// File-backed store: one JSON object per profile directory
///
/// Every operation holds an exclusive advisory lock on a sibling lock file,
/// so a read-modify-write (`take` in particular) is a single step across all
/// handles and processes sharing the profile. Mutations go through a uniquely
/// named temp file and a rename, so a reader never observes a half-written
/// file.
pub struct FileStore {
    dir: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// File name used inside the profile directory
    pub const FILE_NAME: &'static str = "storage.json";

    /// Lock file guarding [`Self::FILE_NAME`]
    pub const LOCK_FILE_NAME: &'static str = "storage.lock";

    /// Open (or lazily create) the store inside `profile_dir`
    pub fn open(profile_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = profile_dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);

        tracing::debug!(path = %path.display(), "Opened file store");

        Ok(Self {
            dir: dir.to_path_buf(),
            lock_path: dir.join(Self::LOCK_FILE_NAME),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` on the entries while holding the profile lock
    fn locked<T>(
        &self,
        op: impl FnOnce(&mut HashMap<String, String>) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        let mut lock = RwLock::new(file);
        let _guard = lock.write()?;

        let mut entries = self.load()?;
        let (value, dirty) = op(&mut entries)?;
        if dirty {
            self.save(&entries)?;
        }
        Ok(value)
    }

    fn load(&self) -> StoreResult<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.locked(|entries| Ok((entries.remove(key), false)))
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.locked(|entries| {
            entries.insert(key.to_string(), value.to_string());
            Ok(((), true))
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.locked(|entries| Ok(((), entries.remove(key).is_some())))
    }

    fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.locked(|entries| {
            let value = entries.remove(key);
            let dirty = value.is_some();
            Ok((value, dirty))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("token").unwrap(), None);

        store.put("token", "abc").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("abc"));

        // Last write wins
        store.put("token", "def").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("def"));

        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);

        // Removing a missing key is fine
        store.remove("token").unwrap();
    }

    #[test]
    fn test_memory_store_basics() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_memory_store_take_is_once() {
        let store = MemoryStore::new();
        store.put("pendingChat", "{}").unwrap();

        assert_eq!(store.take("pendingChat").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.take("pendingChat").unwrap(), None);
    }

    #[test]
    fn test_file_store_basics() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let first = FileStore::open(dir.path()).unwrap();
        first.put("pendingChat", r#"{"open":true}"#).unwrap();
        drop(first);

        let second = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            second.take("pendingChat").unwrap().as_deref(),
            Some(r#"{"open":true}"#)
        );
        assert_eq!(second.get("pendingChat").unwrap(), None);

        let third = FileStore::open(dir.path()).unwrap();
        assert_eq!(third.get("pendingChat").unwrap(), None);
    }

    #[test]
    fn test_file_store_creates_profile_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("profiles").join("default");

        let store = FileStore::open(&nested).unwrap();
        store.put("k", "v").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FileStore::FILE_NAME), "not json").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("k"),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_store_take_once_across_handles() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        const HANDLES: usize = 4;
        let dir = tempfile::tempdir().unwrap();

        for round in 0..50 {
            FileStore::open(dir.path())
                .unwrap()
                .put("pendingChat", &round.to_string())
                .unwrap();

            let barrier = Arc::new(Barrier::new(HANDLES));
            let workers: Vec<_> = (0..HANDLES)
                .map(|_| {
                    let store = FileStore::open(dir.path()).unwrap();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        store.take("pendingChat")
                    })
                })
                .collect();

            let delivered = workers
                .into_iter()
                .map(|w| w.join().unwrap().unwrap())
                .filter(Option::is_some)
                .count();
            assert_eq!(delivered, 1, "round {round}");
        }

        // No temp files left behind
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                let name = e.as_ref().unwrap().file_name();
                name != FileStore::FILE_NAME && name != FileStore::LOCK_FILE_NAME
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
