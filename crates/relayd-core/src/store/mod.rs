//! Persistent per-instance key-value storage.
//!
//! Every extension instance gets an [`NvStore`] proxy namespaced by its
//! container and extension name. Data is durable across process restarts
//! when the host wires in a persistent [`StoreBackend`] (see
//! [`RedbStore`]); the in-memory backend exists for tests and
//! ephemeral hosts. Values survive unload/reload of the extension.

mod memory;
mod redb;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;

use std::sync::Arc;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key has no value. Distinct from an empty-string value.
    #[error("No value for key [{0}]")]
    NotFound(String),

    /// The operation is not provided by this store.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Backend contract for namespaced string-to-string storage.
///
/// The mapping is ordered: `keys` returns keys in ascending order.
pub trait StoreBackend: Send + Sync {
    fn write(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    fn read(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Remove a key, returning whether it existed.
    fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.read(namespace, key)?.is_some())
    }

    /// All keys in the namespace, ascending.
    fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// Drop every key in the namespace.
    fn clear(&self, namespace: &str) -> Result<()>;

    /// Whether data survives a process restart.
    fn is_persistent(&self) -> bool;
}

/// Forward-only cursor over a store's keys.
///
/// Obtained fresh from [`NvStore::keys`] each time iteration starts; there
/// is no rewind. The cursor holds a snapshot taken when it was created.
pub struct StoreCursor {
    keys: std::vec::IntoIter<String>,
}

impl Iterator for StoreCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.keys.next()
    }
}

/// Per-instance view of the host's store, namespaced by container and
/// extension name.
#[derive(Clone)]
pub struct NvStore {
    backend: Arc<dyn StoreBackend>,
    namespace: String,
}

impl NvStore {
    pub fn new(backend: Arc<dyn StoreBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// The namespace this view reads and writes under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.backend.contains(&self.namespace, key)
    }

    /// Fails with [`StoreError::NotFound`] when the key is absent; an
    /// empty string is a present value.
    pub fn get(&self, key: &str) -> Result<String> {
        self.backend
            .read(&self.namespace, key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.backend.write(&self.namespace, key, value)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.backend.delete(&self.namespace, key)
    }

    /// Start a fresh forward-only iteration over the keys.
    pub fn keys(&self) -> Result<StoreCursor> {
        Ok(StoreCursor {
            keys: self.backend.keys(&self.namespace)?.into_iter(),
        })
    }

    /// Key counting is unsupported: the backing host store has no O(1)
    /// count. Fails on every call.
    pub fn len(&self) -> Result<usize> {
        Err(StoreError::Unsupported("len"))
    }

    /// Remove every key in this instance's namespace.
    pub fn clear(&self) -> Result<()> {
        self.backend.clear(&self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NvStore {
        NvStore::new(Arc::new(MemoryStore::new()), "user/alice/echo")
    }

    #[test]
    fn test_set_get_roundtrip() {
        let nv = store();
        nv.set("greeting", "hello").unwrap();
        assert_eq!(nv.get("greeting").unwrap(), "hello");
    }

    #[test]
    fn test_get_absent_is_not_found() {
        let nv = store();
        let err = nv.get("missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_empty_value_is_present() {
        let nv = store();
        nv.set("empty", "").unwrap();
        assert_eq!(nv.get("empty").unwrap(), "");
        assert!(nv.contains("empty").unwrap());
    }

    #[test]
    fn test_delete_then_contains() {
        let nv = store();
        nv.set("key", "value").unwrap();
        assert!(nv.delete("key").unwrap());
        assert!(!nv.contains("key").unwrap());
        assert!(!nv.delete("key").unwrap());
    }

    #[test]
    fn test_len_always_fails() {
        let nv = store();
        assert!(matches!(nv.len(), Err(StoreError::Unsupported("len"))));
        nv.set("a", "1").unwrap();
        assert!(matches!(nv.len(), Err(StoreError::Unsupported("len"))));
    }

    #[test]
    fn test_cursor_is_ordered_and_fresh() {
        let nv = store();
        nv.set("b", "2").unwrap();
        nv.set("a", "1").unwrap();
        nv.set("c", "3").unwrap();

        let keys: Vec<String> = nv.keys().unwrap().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        // A fresh cursor restarts from the beginning.
        let mut cursor = nv.keys().unwrap();
        assert_eq!(cursor.next().as_deref(), Some("a"));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
        let a = NvStore::new(backend.clone(), "user/alice/echo");
        let b = NvStore::new(backend, "user/bob/echo");
        a.set("key", "alice").unwrap();
        assert!(!b.contains("key").unwrap());
    }
}
