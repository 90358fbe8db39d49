//! In-memory backend: no durability, no locking.

use super::{Backend, StoreGuard, StoreError, Table};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<FxHashMap<Table, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .tables
            .read()
            .get(&table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tables
            .write()
            .entry(table)
            .or_default()
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, table: Table, key: &str) -> Result<(), StoreError> {
        if let Some(t) = self.tables.write().get_mut(&table) {
            t.remove(key);
        }
        Ok(())
    }

    fn keys(&self, table: Table) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tables
            .read()
            .get(&table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn replace(&self, table: Table, items: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        let contents = items.iter().cloned().collect();
        self.tables.write().insert(table, contents);
        Ok(())
    }

    fn reopen(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn lock_rebuild(&self) -> Result<StoreGuard, StoreError> {
        Ok(StoreGuard::none())
    }

    fn lock_commit(&self) -> Result<StoreGuard, StoreError> {
        Ok(StoreGuard::none())
    }

    fn try_lock_commit(&self) -> Result<Option<StoreGuard>, StoreError> {
        Ok(Some(StoreGuard::none()))
    }

    fn is_shared(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        backend.put(Table::Entries, "intro", b"one").unwrap();
        assert_eq!(backend.get(Table::Entries, "intro").unwrap().as_deref(), Some(&b"one"[..]));
        assert!(backend.get(Table::Pages, "intro").unwrap().is_none());

        backend.delete(Table::Entries, "intro").unwrap();
        backend.delete(Table::Entries, "intro").unwrap();
        assert!(backend.get(Table::Entries, "intro").unwrap().is_none());
    }

    #[test]
    fn test_replace_drops_stale_keys() {
        let backend = MemoryBackend::new();
        backend.put(Table::Pages, "old", b"x").unwrap();
        backend
            .replace(Table::Pages, &[("new".into(), b"y".to_vec())])
            .unwrap();
        assert_eq!(backend.keys(Table::Pages).unwrap(), ["new"]);
    }
}
