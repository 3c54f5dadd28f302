//! redb-backed persistent store.
//!
//! A single table holds every namespace, using namespaced keys in the form
//! `"{namespace}:{key}"`. redb keeps keys in ascending order, which gives
//! the ordered-mapping contract for free.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, TableError};

use super::{Result, StoreBackend, StoreError};

const NV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("relayd_nv");

/// Create a namespaced key for the unified table.
fn make_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// File-backed store; survives process restarts.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the database at `path`, creating parent
    /// directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            Database::open(path).map_err(|e| StoreError::Backend(e.to_string()))?
        } else {
            Database::create(path).map_err(|e| StoreError::Backend(e.to_string()))?
        };

        Ok(Self { db: Arc::new(db) })
    }
}

impl StoreBackend for RedbStore {
    fn write(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let namespaced = make_key(namespace, key);
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            let mut table = txn
                .open_table(NV_TABLE)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            table
                .insert(&*namespaced, value)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        txn.commit()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let namespaced = make_key(namespace, key);
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let table = match txn.open_table(NV_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };
        let value = table
            .get(&*namespaced)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let namespaced = make_key(namespace, key);
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let existed;
        {
            let mut table = txn
                .open_table(NV_TABLE)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            existed = table
                .remove(&*namespaced)
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .is_some();
        }
        txn.commit()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(existed)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = format!("{namespace}:");
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let table = match txn.open_table(NV_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };

        let mut keys = Vec::new();
        let range = table
            .range(prefix.as_str()..)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        for item in range {
            let (key, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            let key = key.value();
            match key.strip_prefix(&prefix) {
                Some(stripped) => keys.push(stripped.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    fn clear(&self, namespace: &str) -> Result<()> {
        let keys = self.keys(namespace)?;
        if keys.is_empty() {
            return Ok(());
        }
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            let mut table = txn
                .open_table(NV_TABLE)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            for key in keys {
                let namespaced = make_key(namespace, &key);
                table
                    .remove(&*namespaced)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }
        txn.commit()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
