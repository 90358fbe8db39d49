//! Pluggable storage for cache contents.
//!
//! Both backends expose the same byte-level contract, so the content cache is
//! indifferent to which one is active:
//!
//! | Backend          | Durability | Cross-process | Rebuild / commit locks               |
//! |------------------|------------|---------------|--------------------------------------|
//! | `MemoryBackend`  | none       | no            | no-op                                |
//! | `DurableBackend` | redb files | yes           | `fs2` on `rebuild.lock`, `commit.lock` |
//!
//! The rebuild lock spans a whole full reload, parsing included. The commit
//! lock is short: it spans one read-modify-write of the tables plus the
//! generation counter, so a commit always starts from the newest stored state
//! and a reader never hydrates from a half-written one.

mod durable;
mod lock;
mod memory;

pub use durable::DurableBackend;
pub use lock::FileLock;
pub use memory::MemoryBackend;

use std::path::PathBuf;
use thiserror::Error;

/// Logical tables, each keyed by a fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Blog config and the store generation counter.
    Config,
    /// The latest-entries view.
    Latest,
    /// Parsed entries by declared slug.
    Entries,
    /// Page menu: friendly title → URL.
    AllPages,
    /// Parsed pages by page name.
    Pages,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Latest => "latest_entries",
            Self::Entries => "parsed_entries",
            Self::AllPages => "all_pages",
            Self::Pages => "parsed_pages",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("store database error")]
    Database(#[from] redb::Error),

    #[error("malformed value for `{key}` in table `{table}`")]
    Corrupt {
        table: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for `{0}`")]
    Encode(String, #[source] serde_json::Error),
}

/// Held for the duration of a rebuild or commit. Releases on drop.
#[must_use]
pub struct StoreGuard(#[allow(dead_code)] Option<FileLock>);

impl StoreGuard {
    /// A guard that locks nothing.
    pub const fn none() -> Self {
        Self(None)
    }

    pub const fn file(lock: FileLock) -> Self {
        Self(Some(lock))
    }
}

/// Byte-level key-value storage, one namespace per [`Table`].
pub trait Backend: Send + Sync {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write one value. Visible to other readers once this returns.
    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove one key. Removing an absent key is not an error.
    fn delete(&self, table: Table, key: &str) -> Result<(), StoreError>;

    /// All keys of `table`, sorted.
    fn keys(&self, table: Table) -> Result<Vec<String>, StoreError>;

    /// Replace the whole contents of `table` in one commit.
    fn replace(&self, table: Table, items: &[(String, Vec<u8>)]) -> Result<(), StoreError>;

    /// Drop any open handles so the next access observes writes made by
    /// other processes.
    fn reopen(&self) -> Result<(), StoreError>;

    /// Exclusive guard around a whole-store rebuild.
    fn lock_rebuild(&self) -> Result<StoreGuard, StoreError>;

    /// Exclusive guard around one commit (table writes plus generation).
    fn lock_commit(&self) -> Result<StoreGuard, StoreError>;

    /// Like [`lock_commit`](Self::lock_commit), but `None` if another
    /// holder has it right now.
    fn try_lock_commit(&self) -> Result<Option<StoreGuard>, StoreError>;

    /// Whether other processes may write to this store.
    fn is_shared(&self) -> bool;
}
