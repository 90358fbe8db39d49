//! Parsed content cache and its invalidation protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    ContentCache                                  │
//! │                                                                  │
//! │  readers ──────► snapshot() ──► ArcSwap<Snapshot>  (lock-free)   │
//! │                                       ▲                          │
//! │                                       │ store(Arc::new(next))    │
//! │  watcher ─┐                           │                          │
//! │  reload  ─┼──► write_lock ──► build next snapshot ──► Mirror     │
//! │  startup ─┘   (one mutation at a time)             (Backend)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation builds a complete next [`Snapshot`] (config, entries, pages,
//! page index, latest view) and installs it with a single atomic swap, so a
//! reader never sees entries from one config and the latest view from
//! another. With a shared (durable) backend, reads first check the store's
//! generation and rehydrate when another process committed something newer.
//! Mutations take the store's commit lock and rehydrate the same way before
//! building on the current snapshot, so a commit never rests on stale tables.

mod error;
mod loader;
mod mirror;
mod snapshot;

#[cfg(test)]
mod tests;

pub use error::CacheError;
pub use snapshot::{Entry, LATEST_LIMIT, LatestEntry, Page, PageIndex, Snapshot, build_latest};

use crate::{
    config::{ConfigStore, ContentPaths},
    debug,
    document::{DocumentParser, MarkdownParser},
    log,
    store::{Backend, MemoryBackend, StoreError, StoreGuard},
    utils::slug::{page_name, slug_of},
};
use arc_swap::ArcSwap;
use loader::Loader;
use mirror::Mirror;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// A semantic change notification, as produced by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Change {
    /// `config.yml` was modified.
    Config,
    /// `entries/<name>.md` was modified; holds `name`.
    Entry(String),
    /// `pages/<filename>` was modified; holds `filename`.
    Page(String),
}

/// What an incremental reload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A document was (re)parsed and installed.
    Updated,
    /// The backing file is gone and the document was dropped.
    Removed,
    /// The source was identical to the last load.
    Unchanged,
    /// Nothing to do: undeclared entry, non-markdown page, or already absent.
    Ignored,
    /// Parse failed; the previous document, if any, is still served.
    Failed,
}

// ============================================================================
// Builder
// ============================================================================

pub struct ContentCacheBuilder {
    paths: ContentPaths,
    parser: Option<Arc<dyn DocumentParser>>,
    backend: Option<Arc<dyn Backend>>,
}

impl ContentCacheBuilder {
    pub fn parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Perform the startup full reload and return the ready cache.
    ///
    /// # Errors
    ///
    /// Fails on an invalid `config.yml` or an unusable store.
    pub fn build(self) -> Result<ContentCache, CacheError> {
        let parser: Arc<dyn DocumentParser> = match self.parser {
            Some(parser) => parser,
            None => Arc::new(MarkdownParser::new()),
        };
        let backend: Arc<dyn Backend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(MemoryBackend::new()),
        };
        let config_store = ConfigStore::new(self.paths.config_file());
        let mirror = Mirror::new(backend);

        let snapshot = full_rebuild(
            &Loader::new(&self.paths, parser.as_ref()),
            &config_store,
            &mirror,
            0,
        )?;

        Ok(ContentCache {
            paths: self.paths,
            config_store,
            parser,
            mirror,
            current: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
        })
    }
}

// ============================================================================
// ContentCache
// ============================================================================

pub struct ContentCache {
    paths: ContentPaths,
    config_store: ConfigStore,
    parser: Arc<dyn DocumentParser>,
    mirror: Mirror,
    current: ArcSwap<Snapshot>,
    /// Serializes every mutation. Readers never take it.
    write_lock: Mutex<()>,
}

impl ContentCache {
    pub fn builder(paths: ContentPaths) -> ContentCacheBuilder {
        ContentCacheBuilder {
            paths,
            parser: None,
            backend: None,
        }
    }

    #[inline]
    pub fn paths(&self) -> &ContentPaths {
        &self.paths
    }

    /// The current snapshot. Its `Arc` identity changes on every mutation.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        if self.mirror.is_shared() {
            self.refresh();
        }
        self.current.load_full()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get_entry(&self, slug: &str) -> Result<Arc<Entry>, CacheError> {
        self.snapshot()
            .find_entry(slug)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(slug.to_owned()))
    }

    /// Look up a page by name or friendly title.
    pub fn get_page(&self, key: &str) -> Result<Arc<Page>, CacheError> {
        self.snapshot()
            .find_page(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_owned()))
    }

    pub fn get_latest(&self) -> Arc<[LatestEntry]> {
        Arc::clone(&self.snapshot().latest)
    }

    pub fn get_page_index(&self) -> Arc<PageIndex> {
        Arc::clone(&self.snapshot().page_index)
    }

    /// The entry shown at the blog front page.
    pub fn front_page_document(&self) -> Result<Arc<Entry>, CacheError> {
        let snapshot = self.snapshot();
        let slug = snapshot
            .config()
            .front_page_slug()
            .ok_or_else(|| CacheError::NotFound("front page".into()))?;
        snapshot
            .find_entry(slug)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(slug.to_owned()))
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Operator-triggered reload, guarded by the configured secret.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on mismatch, without touching any state.
    pub fn reload(&self, secret: &str) -> Result<(), CacheError> {
        let current = self.current.load();
        let expected = current.config().reload_secret().as_bytes();
        if !bool::from(secret.as_bytes().ct_eq(expected)) {
            return Err(CacheError::Unauthorized);
        }
        drop(current);
        self.full_reload()
    }

    /// Rebuild config, entries, pages and the latest view from disk.
    ///
    /// On a config error the previous snapshot stays installed.
    pub fn full_reload(&self) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock();
        let local = self.current.load().generation();
        let snapshot = full_rebuild(&self.loader(), &self.config_store, &self.mirror, local)?;
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Re-parse one entry file.
    pub fn reload_entry(&self, name: &str) -> ReloadOutcome {
        let _guard = self.write_lock.lock();
        let (_commit, current) = self.begin_commit();

        let Some(slug) = current.config().declared_slug(name).map(str::to_owned) else {
            debug!("entries"; "ignoring undeclared entry `{name}`");
            return ReloadOutcome::Ignored;
        };
        let key = slug_of(&slug);

        if !self.paths.entry_file(&slug).exists() {
            if !current.entries().contains_key(&key) {
                return ReloadOutcome::Ignored;
            }
            let mut next = self.next_snapshot(&current);
            Arc::make_mut(&mut next.entries).remove(&key);
            next.relatest();
            self.install(next, |mirror, s| {
                mirror.delete_entry(&slug)?;
                mirror.put_latest(s.latest())
            });
            log!("entries"; "removed {slug}");
            return ReloadOutcome::Removed;
        }

        let Some(entry) = self.loader().entry(&slug) else {
            return ReloadOutcome::Failed;
        };

        let mut next = self.next_snapshot(&current);
        Arc::make_mut(&mut next.entries).insert(key, Arc::clone(&entry));
        next.relatest();
        self.install(next, |mirror, s| {
            mirror.put_entry(&entry)?;
            mirror.put_latest(s.latest())
        });
        log!("entries"; "reloaded {slug}");
        ReloadOutcome::Updated
    }

    /// Re-parse one file of the pages directory.
    pub fn reload_page(&self, filename: &str) -> ReloadOutcome {
        let Some(name) = page_name(filename) else {
            return ReloadOutcome::Ignored;
        };
        let key = slug_of(name);

        let _guard = self.write_lock.lock();
        let (_commit, current) = self.begin_commit();
        let previous = current.pages().get(&key).cloned();

        if !self.paths.page_file(filename).exists() {
            let Some(previous) = previous else {
                return ReloadOutcome::Ignored;
            };
            let mut next = self.next_snapshot(&current);
            Arc::make_mut(&mut next.pages).remove(&key);
            next.reindex_pages();
            self.install(next, |mirror, _| mirror.delete_page(&previous));
            log!("pages"; "removed {name}");
            return ReloadOutcome::Removed;
        }

        let Some(page) = self.loader().page(filename) else {
            return ReloadOutcome::Failed;
        };

        let mut next = self.next_snapshot(&current);
        Arc::make_mut(&mut next.pages).insert(key, Arc::clone(&page));
        next.reindex_pages();
        self.install(next, |mirror, _| {
            if let Some(previous) = previous.filter(|p| p.name != page.name) {
                mirror.delete_page(&previous)?;
            }
            mirror.put_page(&page)
        });
        log!("pages"; "reloaded {name}");
        ReloadOutcome::Updated
    }

    /// Reload `config.yml` and reconcile entries with the new slug list.
    ///
    /// Entries no longer declared are dropped even if their file still
    /// exists; newly declared slugs are parsed; the rest are kept as is.
    ///
    /// # Errors
    ///
    /// On a config error nothing changes.
    pub fn reload_config(&self) -> Result<ReloadOutcome, CacheError> {
        let _guard = self.write_lock.lock();
        let (_commit, current) = self.begin_commit();
        let Some(config) = self.config_store.load_if_changed()? else {
            return Ok(ReloadOutcome::Unchanged);
        };

        let previously_declared: FxHashSet<String> =
            current.config().entry_slugs().iter().map(|s| slug_of(s)).collect();
        let declared: FxHashSet<String> =
            config.entry_slugs().iter().map(|s| slug_of(s)).collect();

        let dropped: Vec<Arc<Entry>> = current
            .entries()
            .iter()
            .filter(|(key, _)| !declared.contains(*key))
            .map(|(_, entry)| Arc::clone(entry))
            .collect();
        let added = self.loader().entries(
            config
                .entry_slugs()
                .iter()
                .filter(|slug| !previously_declared.contains(&slug_of(slug))),
        );

        let mut next = self.next_snapshot(&current);
        {
            let entries = Arc::make_mut(&mut next.entries);
            entries.retain(|key, _| declared.contains(key));
            entries.extend(added.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        }
        next.config = Arc::new(config);
        next.relatest();

        self.install(next, |mirror, s| {
            mirror.put_config(s.config())?;
            for entry in &dropped {
                mirror.delete_entry(&entry.slug)?;
            }
            for entry in added.values() {
                mirror.put_entry(entry)?;
            }
            mirror.put_latest(s.latest())
        });

        log!("config"; "reloaded: {} dropped, {} added", dropped.len(), added.len());
        Ok(ReloadOutcome::Updated)
    }

    /// Dispatch a watcher notification. Errors are logged, never raised.
    pub fn apply(&self, change: &Change) -> ReloadOutcome {
        match change {
            Change::Config => self.reload_config().unwrap_or_else(|err| {
                log!("config"; "reload failed, keeping previous config: {err}");
                ReloadOutcome::Failed
            }),
            Change::Entry(name) => self.reload_entry(name),
            Change::Page(filename) => self.reload_page(filename),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn loader(&self) -> Loader<'_> {
        Loader::new(&self.paths, self.parser.as_ref())
    }

    /// Clone of `current` stamped with the next generation.
    fn next_snapshot(&self, current: &Snapshot) -> Snapshot {
        let mut next = current.clone();
        next.generation = next_generation(&self.mirror, current.generation());
        next
    }

    /// Persist the delta, then swap `next` in for readers.
    ///
    /// The in-memory snapshot is authoritative for this process: a store
    /// failure is logged and the swap still happens.
    fn install(
        &self,
        next: Snapshot,
        persist: impl FnOnce(&Mirror, &Snapshot) -> Result<(), StoreError>,
    ) {
        let result = persist(&self.mirror, &next)
            .and_then(|()| self.mirror.set_generation(next.generation()));
        if let Err(err) = result {
            log!("store"; "failed to persist change: {err}");
        }
        self.current.store(Arc::new(next));
    }

    /// Take the store's commit lock and catch up with other processes.
    ///
    /// Returns the snapshot the commit must build on. A lock failure is
    /// logged and the commit proceeds unguarded.
    fn begin_commit(&self) -> (StoreGuard, Arc<Snapshot>) {
        let guard = self.mirror.lock_commit().unwrap_or_else(|err| {
            log!("store"; "unable to lock store for commit: {err}");
            StoreGuard::none()
        });
        if self.mirror.is_shared() {
            self.adopt_newer();
        }
        (guard, self.current.load_full())
    }

    /// Adopt a newer snapshot committed to the store by another process.
    ///
    /// Skipped while a local mutation is in flight or another process is
    /// committing; readers never wait.
    fn refresh(&self) {
        let Some(_guard) = self.write_lock.try_lock() else {
            return;
        };
        match self.mirror.try_lock_commit() {
            Ok(Some(_commit)) => self.adopt_newer(),
            Ok(None) => debug!("store"; "commit in progress, serving current snapshot"),
            Err(err) => log!("store"; "refresh failed: {err}"),
        }
    }

    /// Install the stored snapshot if its generation is past ours.
    ///
    /// Caller holds both `write_lock` and the commit lock.
    fn adopt_newer(&self) {
        let local = self.current.load().generation();

        let stored = match self.mirror.reopen().and_then(|()| self.mirror.generation()) {
            Ok(generation) => generation,
            Err(err) => {
                log!("store"; "refresh failed: {err}");
                return;
            }
        };
        if stored <= local {
            return;
        }

        match self.mirror.read_all() {
            Ok(Some(snapshot)) => {
                debug!("store"; "adopting generation {stored} (was {local})");
                self.current.store(Arc::new(snapshot));
            }
            Ok(None) => {}
            Err(err) => log!("store"; "refresh failed: {err}"),
        }
    }
}

/// Generation for the next commit: past both ours and the store's.
///
/// Read under the commit lock, so no other process can claim the same one.
fn next_generation(mirror: &Mirror, local: u64) -> u64 {
    let stored = mirror.generation().unwrap_or_else(|err| {
        log!("store"; "unable to read generation: {err}");
        local
    });
    stored.max(local) + 1
}

/// Load everything from disk into a fresh snapshot and mirror it.
///
/// Holds the backend's rebuild lock throughout, so only one process rebuilds
/// a shared store at a time, and the commit lock while writing.
fn full_rebuild(
    loader: &Loader<'_>,
    config_store: &ConfigStore,
    mirror: &Mirror,
    local_generation: u64,
) -> Result<Snapshot, CacheError> {
    let _rebuild = mirror.lock_rebuild()?;
    let config = config_store.load()?;

    log!("entries"; "parsing {} entries...", config.entry_slugs().len());
    let entries = loader.entries(config.entry_slugs());
    log!("entries"; "parsed {} of {}", entries.len(), config.entry_slugs().len());

    let pages = loader.pages();
    log!("pages"; "parsed {} pages", pages.len());

    let _commit = mirror.lock_commit()?;
    let generation = next_generation(mirror, local_generation);
    let snapshot = Snapshot::new(config, entries, pages, generation);

    if let Err(err) = mirror.write_all(&snapshot) {
        log!("store"; "failed to persist full reload: {err}");
    }
    Ok(snapshot)
}
