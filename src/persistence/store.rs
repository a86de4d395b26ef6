use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;

/// Durable string-to-string storage, the only thing persistence needs.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    quota: Option<usize>,
    unavailable: bool,
}

/// In-memory store. Clones share the same map so a test can keep a handle
/// after giving one to the persistence layer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes that would push the total stored bytes over `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::default();
        store.inner.lock().quota = Some(bytes);
        store
    }

    /// Makes every operation fail, or recover, from now on.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .values
            .insert(key.to_owned(), value.to_owned());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        Ok(inner.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        if let Some(quota) = inner.quota {
            let others: usize = inner
                .values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    bytes: value.len(),
                });
            }
        }
        inner.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        inner.values.remove(key);
        Ok(())
    }
}

/// One file per key under a directory. Keys are reduced to a safe file name.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        // temp file + rename: readers never see a partial value
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("canvas_draw_store_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_quota() {
        let mut store = MemoryStore::with_quota(16);
        store.set("a", "12345".into()).unwrap();
        let err = store.set("b", "x".repeat(20)).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        // Overwriting an existing key only counts the new value
        store.set("a", "1234567890".into()).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_memory_store_unavailable() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.get("k"), Err(StorageError::Unavailable)));
        assert!(matches!(store.set("k", "v".into()), Err(StorageError::Unavailable)));
        store.set_unavailable(false);
        store.set("k", "v".into()).unwrap();
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = temp_dir();
        let mut store = FileStore::new(&dir);

        assert_eq!(store.get("canvasDraw_current").unwrap(), None);
        store.set("canvasDraw_current", "hello".into()).unwrap();
        assert_eq!(store.get("canvasDraw_current").unwrap().as_deref(), Some("hello"));

        store.remove("canvasDraw_current").unwrap();
        store.remove("canvasDraw_current").unwrap();
        assert_eq!(store.get("canvasDraw_current").unwrap(), None);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_store_key_cannot_escape_dir() {
        let store = FileStore::new("/tmp/store");
        let path = store.path_for("../../etc/passwd");
        assert_eq!(path.parent(), Some(std::path::Path::new("/tmp/store")));
    }
}
