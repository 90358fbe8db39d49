//! On-disk backend: one `redb` database per table.
//!
//! # Layout
//!
//! ```text
//! <store>/
//!  ├── config.redb          ├── config.lock
//!  ├── latest_entries.redb  ├── latest_entries.lock
//!  ├── parsed_entries.redb  ├── parsed_entries.lock
//!  ├── all_pages.redb       ├── all_pages.lock
//!  ├── parsed_pages.redb    ├── parsed_pages.lock
//!  ├── rebuild.lock
//!  └── commit.lock
//! ```
//!
//! redb refuses a second open of the same file, even from another process, so
//! a database handle never outlives a single operation: it is opened under the
//! table's access lock, used, committed with immediate durability and closed.
//! Every read therefore observes the latest commit of any process. The access
//! lock is held only for one operation; `rebuild.lock` is a separate, coarser
//! guard that only full rebuilds take; `commit.lock` spans one multi-table commit.

use super::{Backend, FileLock, StoreGuard, StoreError, Table};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::{
    fs,
    path::{Path, PathBuf},
};

const DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("data");

const REBUILD_LOCK: &str = "rebuild.lock";
const COMMIT_LOCK: &str = "commit.lock";

#[derive(Debug)]
pub struct DurableBackend {
    dir: PathBuf,
}

impl DurableBackend {
    /// Open (creating if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| StoreError::Io(dir.clone(), err))?;
        Ok(Self { dir })
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn db_path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.redb", table.name()))
    }

    fn lock_path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.lock", table.name()))
    }

    /// Run `f` against a freshly opened database for `table`.
    fn with_db<T>(
        &self,
        table: Table,
        f: impl FnOnce(&Database) -> Result<T, redb::Error>,
    ) -> Result<T, StoreError> {
        let _access = FileLock::exclusive(&self.lock_path(table))?;
        let db = Database::create(self.db_path(table)).map_err(redb::Error::from)?;
        Ok(f(&db)?)
    }
}

impl Backend for DurableBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_db(table, |db| {
            let txn = db.begin_read()?;
            let data = match txn.open_table(DATA) {
                Ok(data) => data,
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            Ok(data.get(key)?.map(|value| value.value().to_vec()))
        })
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.with_db(table, |db| {
            let txn = db.begin_write()?;
            {
                let mut data = txn.open_table(DATA)?;
                data.insert(key, value)?;
            }
            txn.commit()?;
            Ok(())
        })
    }

    fn delete(&self, table: Table, key: &str) -> Result<(), StoreError> {
        self.with_db(table, |db| {
            let txn = db.begin_write()?;
            {
                let mut data = txn.open_table(DATA)?;
                data.remove(key)?;
            }
            txn.commit()?;
            Ok(())
        })
    }

    fn keys(&self, table: Table) -> Result<Vec<String>, StoreError> {
        self.with_db(table, |db| {
            let txn = db.begin_read()?;
            let data = match txn.open_table(DATA) {
                Ok(data) => data,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(err) => return Err(err.into()),
            };
            let mut keys = Vec::new();
            for item in data.iter()? {
                let (key, _) = item?;
                keys.push(key.value().to_owned());
            }
            Ok(keys)
        })
    }

    fn replace(&self, table: Table, items: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        self.with_db(table, |db| {
            let txn = db.begin_write()?;
            txn.delete_table(DATA)?;
            {
                let mut data = txn.open_table(DATA)?;
                for (key, value) in items {
                    data.insert(key.as_str(), value.as_slice())?;
                }
            }
            txn.commit()?;
            Ok(())
        })
    }

    /// Handles are already per-operation; this only re-creates the store
    /// directory if it was removed underneath us.
    fn reopen(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|err| StoreError::Io(self.dir.clone(), err))
    }

    fn lock_rebuild(&self) -> Result<StoreGuard, StoreError> {
        FileLock::exclusive(&self.dir.join(REBUILD_LOCK)).map(StoreGuard::file)
    }

    fn lock_commit(&self) -> Result<StoreGuard, StoreError> {
        FileLock::exclusive(&self.dir.join(COMMIT_LOCK)).map(StoreGuard::file)
    }

    fn try_lock_commit(&self) -> Result<Option<StoreGuard>, StoreError> {
        Ok(FileLock::try_exclusive(&self.dir.join(COMMIT_LOCK))?.map(StoreGuard::file))
    }

    fn is_shared(&self) -> bool {
        true
    }
}
