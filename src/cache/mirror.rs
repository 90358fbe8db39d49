//! Typed mirror of cache tables onto a [`Backend`].
//!
//! | Table            | Key            | Value (JSON)          |
//! |------------------|----------------|-----------------------|
//! | `config`         | `config`       | `BlogConfig`          |
//! | `config`         | `generation`   | `u64`                 |
//! | `latest_entries` | `latest`       | `[LatestEntry]`       |
//! | `parsed_entries` | declared slug  | `StoredDocument`      |
//! | `all_pages`      | friendly title | page URL              |
//! | `parsed_pages`   | page name      | `StoredDocument`      |

use super::snapshot::{Entry, EntryTable, LatestEntry, Page, PageTable, Snapshot};
use crate::{
    config::BlogConfig,
    document::{ParsedDocument, StoredDocument},
    store::{Backend, StoreGuard, StoreError, Table},
    utils::slug::slug_of,
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

const CONFIG_KEY: &str = "config";
const GENERATION_KEY: &str = "generation";
const LATEST_KEY: &str = "latest";

#[derive(Clone)]
pub struct Mirror {
    backend: Arc<dyn Backend>,
}

impl Mirror {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.backend.is_shared()
    }

    pub fn reopen(&self) -> Result<(), StoreError> {
        self.backend.reopen()
    }

    pub fn lock_rebuild(&self) -> Result<StoreGuard, StoreError> {
        self.backend.lock_rebuild()
    }

    pub fn lock_commit(&self) -> Result<StoreGuard, StoreError> {
        self.backend.lock_commit()
    }

    pub fn try_lock_commit(&self) -> Result<Option<StoreGuard>, StoreError> {
        self.backend.try_lock_commit()
    }

    /// Last committed generation, 0 for an empty store.
    pub fn generation(&self) -> Result<u64, StoreError> {
        Ok(self.get(Table::Config, GENERATION_KEY)?.unwrap_or(0))
    }

    pub fn set_generation(&self, generation: u64) -> Result<(), StoreError> {
        self.put(Table::Config, GENERATION_KEY, &generation)
    }

    // ------------------------------------------------------------------------
    // Whole-store writes
    // ------------------------------------------------------------------------

    /// Replace every table with the contents of `snapshot`.
    pub fn write_all(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let entries = snapshot
            .entries()
            .values()
            .map(|entry| encode(&entry.slug, &StoredDocument::from(&entry.document)))
            .collect::<Result<Vec<_>, _>>()?;
        let pages = snapshot
            .pages()
            .values()
            .map(|page| encode(&page.name, &StoredDocument::from(&page.document)))
            .collect::<Result<Vec<_>, _>>()?;
        let index = snapshot
            .page_index()
            .iter()
            .map(|(title, url)| encode(title, url))
            .collect::<Result<Vec<_>, _>>()?;

        self.backend.replace(Table::Entries, &entries)?;
        self.backend.replace(Table::Pages, &pages)?;
        self.backend.replace(Table::AllPages, &index)?;
        self.put_latest(snapshot.latest())?;
        self.put_config(snapshot.config())?;
        // Last, so readers never see a generation whose tables are incomplete.
        self.set_generation(snapshot.generation())
    }

    /// Rebuild a snapshot from the store. `None` when no config was ever stored.
    ///
    /// Callers hold the commit lock so the tables belong to one generation.
    pub fn read_all(&self) -> Result<Option<Snapshot>, StoreError> {
        let generation = self.generation()?;
        let Some(config) = self.get::<BlogConfig>(Table::Config, CONFIG_KEY)? else {
            return Ok(None);
        };

        let mut entries = EntryTable::default();
        for slug in self.backend.keys(Table::Entries)? {
            if let Some(stored) = self.get::<StoredDocument>(Table::Entries, &slug)? {
                let entry = Entry {
                    slug: slug.clone(),
                    document: ParsedDocument::from(stored),
                };
                entries.insert(slug_of(&slug), Arc::new(entry));
            }
        }

        let mut pages = PageTable::default();
        for name in self.backend.keys(Table::Pages)? {
            if let Some(stored) = self.get::<StoredDocument>(Table::Pages, &name)? {
                let page = Page::new(&name, ParsedDocument::from(stored));
                pages.insert(page.slug(), Arc::new(page));
            }
        }

        // The page index and latest view are derived again from the tables
        // just read rather than trusted from their own tables.
        Ok(Some(Snapshot::new(config, entries, pages, generation)))
    }

    // ------------------------------------------------------------------------
    // Incremental writes
    // ------------------------------------------------------------------------

    pub fn put_config(&self, config: &BlogConfig) -> Result<(), StoreError> {
        self.put(Table::Config, CONFIG_KEY, config)
    }

    pub fn put_latest(&self, latest: &[LatestEntry]) -> Result<(), StoreError> {
        self.put(Table::Latest, LATEST_KEY, &latest)
    }

    pub fn put_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        self.put(Table::Entries, &entry.slug, &StoredDocument::from(&entry.document))
    }

    pub fn delete_entry(&self, slug: &str) -> Result<(), StoreError> {
        self.backend.delete(Table::Entries, slug)
    }

    pub fn put_page(&self, page: &Page) -> Result<(), StoreError> {
        self.put(Table::Pages, &page.name, &StoredDocument::from(&page.document))?;
        self.put(Table::AllPages, &page.friendly_title, &page.url())
    }

    pub fn delete_page(&self, page: &Page) -> Result<(), StoreError> {
        self.backend.delete(Table::Pages, &page.name)?;
        self.backend.delete(Table::AllPages, &page.friendly_title)
    }

    // ------------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------------

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.backend.get(table, key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                table: table.name(),
                key: key.to_owned(),
                source,
            })
    }

    fn put<T: Serialize + ?Sized>(&self, table: Table, key: &str, value: &T) -> Result<(), StoreError> {
        let (key, bytes) = encode(key, value)?;
        self.backend.put(table, &key, &bytes)
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<(String, Vec<u8>), StoreError> {
    serde_json::to_vec(value)
        .map(|bytes| (key.to_owned(), bytes))
        .map_err(|err| StoreError::Encode(key.to_owned(), err))
}
