//! Immutable cache snapshot.
//!
//! Readers only ever hold an `Arc<Snapshot>`; writers build the next snapshot
//! beside the current one and swap it in. Tables are `Arc`-shared between
//! consecutive snapshots, so an incremental reload clones only the table it
//! touches.

use crate::{
    config::{BlogConfig, paths::entry_url, paths::page_url},
    document::ParsedDocument,
    utils::slug::{friendly_title, lookup_candidates, slug_of},
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// Maximum length of the latest-entries view.
pub const LATEST_LIMIT: usize = 9;

/// A configured blog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Slug as declared in `config.yml`.
    pub slug: String,
    pub document: ParsedDocument,
}

impl Entry {
    pub fn url(&self) -> String {
        entry_url(&self.slug)
    }
}

/// A free-standing page from the pages directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// File name without extension, as written on disk.
    pub name: String,
    pub friendly_title: String,
    pub document: ParsedDocument,
}

impl Page {
    pub fn new(name: &str, document: ParsedDocument) -> Self {
        Self {
            name: name.to_owned(),
            friendly_title: friendly_title(name),
            document,
        }
    }

    #[inline]
    pub fn slug(&self) -> String {
        slug_of(&self.name)
    }

    pub fn url(&self) -> String {
        page_url(&self.name)
    }
}

/// One item of the latest-entries view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestEntry {
    pub title: String,
    pub url: String,
}

pub type EntryTable = FxHashMap<String, Arc<Entry>>;
pub type PageTable = FxHashMap<String, Arc<Page>>;
/// Friendly title → page URL, ordered by title.
pub type PageIndex = BTreeMap<String, String>;

/// Consistent view of config, entries, pages and the derived views.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(super) config: Arc<BlogConfig>,
    /// Keyed by `slug_of(slug)`.
    pub(super) entries: Arc<EntryTable>,
    /// Keyed by `slug_of(name)`.
    pub(super) pages: Arc<PageTable>,
    pub(super) page_index: Arc<PageIndex>,
    /// Lower-cased friendly title → page key.
    pub(super) friendly: Arc<FxHashMap<String, String>>,
    pub(super) latest: Arc<[LatestEntry]>,
    pub(super) generation: u64,
}

impl Snapshot {
    /// Assemble a snapshot, deriving the page index and latest view.
    pub fn new(config: BlogConfig, entries: EntryTable, pages: PageTable, generation: u64) -> Self {
        let mut snapshot = Self {
            config: Arc::new(config),
            entries: Arc::new(entries),
            pages: Arc::new(pages),
            page_index: Arc::default(),
            friendly: Arc::default(),
            latest: Arc::from(Vec::new()),
            generation,
        };
        snapshot.reindex_pages();
        snapshot.relatest();
        snapshot
    }

    #[inline]
    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    #[inline]
    pub fn entries(&self) -> &EntryTable {
        &self.entries
    }

    #[inline]
    pub fn pages(&self) -> &PageTable {
        &self.pages
    }

    #[inline]
    pub fn page_index(&self) -> &PageIndex {
        &self.page_index
    }

    #[inline]
    pub fn latest(&self) -> &[LatestEntry] {
        &self.latest
    }

    /// Store generation this snapshot corresponds to.
    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Tolerant entry lookup: lower-cased, then underscore/space variants.
    pub fn find_entry(&self, requested: &str) -> Option<&Arc<Entry>> {
        lookup_candidates(requested)
            .iter()
            .find_map(|key| self.entries.get(key))
    }

    /// Tolerant page lookup by name or friendly title.
    pub fn find_page(&self, requested: &str) -> Option<&Arc<Page>> {
        let candidates = lookup_candidates(requested);
        candidates
            .iter()
            .find_map(|key| self.pages.get(key))
            .or_else(|| {
                candidates
                    .iter()
                    .filter_map(|key| self.friendly.get(key))
                    .find_map(|slug| self.pages.get(slug))
            })
    }

    // ------------------------------------------------------------------------
    // Derived views (always recomputed whole)
    // ------------------------------------------------------------------------

    pub(super) fn relatest(&mut self) {
        self.latest = build_latest(&self.config, &self.entries).into();
    }

    pub(super) fn reindex_pages(&mut self) {
        let mut index = PageIndex::new();
        let mut friendly = FxHashMap::default();
        for (slug, page) in self.pages.iter() {
            index.insert(page.friendly_title.clone(), page.url());
            friendly.insert(page.friendly_title.to_lowercase(), slug.clone());
        }
        self.page_index = Arc::new(index);
        self.friendly = Arc::new(friendly);
    }
}

/// Newest-first entries with a title, at most [`LATEST_LIMIT`].
///
/// Slugs whose entry is missing or untitled are skipped, not counted.
pub fn build_latest(config: &BlogConfig, entries: &EntryTable) -> Vec<LatestEntry> {
    config
        .reversed_entry_slugs()
        .iter()
        .filter_map(|slug| {
            let entry = entries.get(&slug_of(slug))?;
            let title = entry.document.title()?;
            Some(LatestEntry {
                title: title.to_owned(),
                url: entry_url(slug),
            })
        })
        .take(LATEST_LIMIT)
        .collect()
}
