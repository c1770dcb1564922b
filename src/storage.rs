//! Key-value persistence for the task list
//!
//! The list is stored as one JSON blob under a single key, overwritten in
//! full after every mutation.
//!
//! # Directory Structure
//!
//! ```text
//! <data dir>/
//!   config.toml          # Optional configuration
//!   todos.json           # Task list blob for the default key
//!   todos.json.lock      # Advisory lock guarding reads and writes
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{self, Task};

/// Key used when the configuration does not name one
pub const DEFAULT_STORAGE_KEY: &str = "todos";

/// String blob storage addressed by key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn contains(&self, key: &str) -> Result<bool>;
}

/// Reject keys that could escape the data directory.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidStorageKey("key cannot be empty".to_string()));
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(Error::InvalidStorageKey(format!(
            "'{key}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// One `<key>.json` file per key inside a directory.
///
/// Each read and write takes `<key>.json.lock` for its own duration, unless
/// the store holds that key's lock from [`FileStore::lock_key`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    lock_timeout_ms: u64,
    held: Option<Rc<HeldLock>>,
}

#[derive(Debug)]
struct HeldLock {
    key: String,
    _lock: FileLock,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            held: None,
        }
    }

    /// Hold `key`'s lock until this store and all its clones are dropped.
    pub fn lock_key(mut self, key: &str) -> Result<Self> {
        let path = self.path_for(key)?;
        let lock = FileLock::acquire(lock::lock_path_for(&path), self.lock_timeout_ms)?;
        debug!(key, "holding store lock");
        self.held = Some(Rc::new(HeldLock {
            key: key.to_string(),
            _lock: lock,
        }));
        Ok(self)
    }

    fn holds(&self, key: &str) -> bool {
        self.held.as_ref().is_some_and(|held| held.key == key)
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the blob file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        if self.holds(key) {
            return lock::read_str(&path).map(Some);
        }
        lock::read_locked_str(&path, self.lock_timeout_ms).map(Some)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        if self.holds(key) {
            return lock::write_atomic(&path, value.as_bytes());
        }
        lock::write_atomic_locked(&path, value.as_bytes(), self.lock_timeout_ms)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.exists())
    }
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.borrow().contains_key(key))
    }
}

/// Read the stored list, reporting unreadable data as `PersistenceRead`.
pub(crate) fn read_tasks<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<Vec<Task>> {
    let read_error = |reason: String| Error::PersistenceRead {
        key: key.to_string(),
        reason,
    };
    if !store.contains(key).map_err(|err| read_error(err.to_string()))? {
        return Ok(Vec::new());
    }
    let Some(raw) = store.get(key).map_err(|err| read_error(err.to_string()))? else {
        return Ok(Vec::new());
    };
    task::decode_tasks(&raw).map_err(|err| read_error(err.to_string()))
}

/// Load the stored list. Missing or unreadable data yields an empty list.
pub fn load_tasks<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Vec<Task> {
    match read_tasks(store, key) {
        Ok(tasks) => {
            debug!(key, count = tasks.len(), "loaded tasks");
            tasks
        }
        Err(err) => {
            warn!(key, error = %err, "discarding unreadable task data");
            Vec::new()
        }
    }
}

/// Overwrite the stored list with `tasks`.
///
/// Failures are logged here; callers decide whether to surface them.
pub fn save_tasks<S: KeyValueStore + ?Sized>(store: &mut S, key: &str, tasks: &[Task]) -> Result<()> {
    let result = task::encode_tasks(tasks).and_then(|blob| store.set(key, &blob));
    match result {
        Ok(()) => {
            debug!(key, count = tasks.len(), "saved tasks");
            Ok(())
        }
        Err(err) => {
            warn!(key, error = %err, "failed to save tasks");
            Err(Error::PersistenceWrite {
                key: key.to_string(),
                reason: err.to_string(),
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::BrokenStore;
    use super::*;
    use crate::task::Priority;
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<Task> {
        let created = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut done = Task::new(2, "done", Priority::Important, created);
        done.completed = true;
        vec![done, Task::new(1, "open", Priority::Normal, created)]
    }

    #[test]
    fn missing_key_loads_empty() {
        let store = MemoryStore::new();
        assert!(load_tasks(&store, DEFAULT_STORAGE_KEY).is_empty());
    }

    #[test]
    fn corrupted_blob_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        assert!(load_tasks(&store, DEFAULT_STORAGE_KEY).is_empty());

        store.set(DEFAULT_STORAGE_KEY, r#"[{"id":"x"}]"#).unwrap();
        assert!(load_tasks(&store, DEFAULT_STORAGE_KEY).is_empty());
    }

    #[test]
    fn read_tasks_reports_corruption() {
        let mut store = MemoryStore::new();
        assert_eq!(read_tasks(&store, DEFAULT_STORAGE_KEY).expect("missing"), Vec::new());
        store.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        assert!(matches!(
            read_tasks(&store, DEFAULT_STORAGE_KEY),
            Err(Error::PersistenceRead { .. })
        ));
    }

    #[test]
    fn inaccessible_store_loads_empty() {
        assert!(load_tasks(&BrokenStore::default(), DEFAULT_STORAGE_KEY).is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = MemoryStore::new();
        let tasks = sample();
        save_tasks(&mut store, DEFAULT_STORAGE_KEY, &tasks).expect("save");
        assert_eq!(load_tasks(&store, DEFAULT_STORAGE_KEY), tasks);
    }

    #[test]
    fn save_failure_reports_write_error() {
        let mut store = BrokenStore::default();
        let err = save_tasks(&mut store, DEFAULT_STORAGE_KEY, &sample()).expect_err("should fail");
        assert!(matches!(err, Error::PersistenceWrite { .. }));
        assert_eq!(store.writes_attempted, 1);
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let mut first = MemoryStore::new();
        let second = first.clone();
        first.set("k", "v").unwrap();
        assert_eq!(second.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("data"));
        assert!(!store.contains(DEFAULT_STORAGE_KEY).unwrap());
        assert_eq!(store.get(DEFAULT_STORAGE_KEY).unwrap(), None);

        save_tasks(&mut store, DEFAULT_STORAGE_KEY, &sample()).expect("save");
        assert!(store.contains(DEFAULT_STORAGE_KEY).unwrap());
        assert_eq!(load_tasks(&store, DEFAULT_STORAGE_KEY), sample());

        save_tasks(&mut store, DEFAULT_STORAGE_KEY, &[]).expect("save empty");
        assert_eq!(store.get(DEFAULT_STORAGE_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn held_key_lock_excludes_other_stores_until_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut holder = FileStore::new(dir.path())
            .with_lock_timeout(100)
            .lock_key(DEFAULT_STORAGE_KEY)
            .expect("lock key");
        save_tasks(&mut holder, DEFAULT_STORAGE_KEY, &sample()).expect("save under held lock");
        assert_eq!(read_tasks(&holder, DEFAULT_STORAGE_KEY).expect("read"), sample());

        let mut other = FileStore::new(dir.path()).with_lock_timeout(100);
        assert!(matches!(
            other.set(DEFAULT_STORAGE_KEY, "[]"),
            Err(Error::LockFailed(_))
        ));
        assert!(matches!(
            other.clone().lock_key(DEFAULT_STORAGE_KEY),
            Err(Error::LockFailed(_))
        ));
        other.set("other_key", "[]").expect("unrelated key is free");

        drop(holder);
        other.set(DEFAULT_STORAGE_KEY, "[]").expect("lock released on drop");
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "[]"),
            Err(Error::InvalidStorageKey(_))
        ));
        assert!(matches!(store.get(""), Err(Error::InvalidStorageKey(_))));
        assert!(store.path_for("work_list-2").is_ok());
    }
}
