//! In-memory store backend for tests and ephemeral hosts.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{Result, StoreBackend};

/// Ordered in-memory backend; nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryStore {
    fn write(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.data
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .data
            .write()
            .get_mut(namespace)
            .map(|ns| ns.remove(key).is_some())
            .unwrap_or(false))
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn clear(&self, namespace: &str) -> Result<()> {
        self.data.write().remove(namespace);
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
