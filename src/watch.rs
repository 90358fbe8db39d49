//! File system watcher for live reload.
//!
//! Monitors the blog root and turns raw `notify` events into [`Change`]s that
//! the [`ContentCache`] applies incrementally.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Watch thread                          │
//! │                                                            │
//! │  ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌───────┐  │
//! │  │ notify   │──▶│ classify() │──▶│ Debouncer│──▶│ apply │  │
//! │  │ events   │   │ → Change   │   │ (300ms)  │   │       │  │
//! │  └──────────┘   └────────────┘   └──────────┘   └───────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only modification events are acted on. Created, removed and renamed files
//! are picked up lazily: the next reload of that entry or page, or the next
//! full reload, notices the file is gone.

use crate::{
    cache::{Change, ContentCache, ReloadOutcome},
    config::paths::{CONFIG_FILE, ENTRIES_DIR, MARKDOWN_EXT, PAGES_DIR},
    debug, log,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use rustc_hash::FxHashSet;
use std::{
    path::{Component, Path},
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;

/// Suffixes JetBrains IDEs use for their safe-write scratch files.
const IDE_SUFFIXES: &[&str] = &["___jb_tmp___", "___jb_old___"];

// =============================================================================
// Classification
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || IDE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Map one filesystem event on `path` to the cache change it implies.
///
/// `root` is the watched blog root. Returns `None` for anything the cache
/// does not react to.
pub fn classify(kind: &EventKind, path: &Path, root: &Path) -> Option<Change> {
    if !matches!(kind, EventKind::Modify(m) if !matches!(m, ModifyKind::Name(_))) {
        return None;
    }
    if is_temp_file(path) || path.extension().is_none() || path.is_dir() {
        return None;
    }

    let rel = path.strip_prefix(root).ok()?;
    let segments: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    match segments.as_slice() {
        [file] if *file == CONFIG_FILE => Some(Change::Config),
        [dir, file] if *dir == ENTRIES_DIR => {
            let stem = file.strip_suffix(&format!(".{MARKDOWN_EXT}"))?;
            (!stem.is_empty()).then(|| Change::Entry(stem.to_owned()))
        }
        [dir, file] if *dir == PAGES_DIR => Some(Change::Page((*file).to_owned())),
        _ => None,
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid changes until a quiet window has passed.
struct Debouncer {
    pending: FxHashSet<Change>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            window,
        }
    }

    fn add(&mut self, change: Change) {
        self.pending.insert(change);
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    /// Drain pending changes, config first so entry reloads see the new slug list.
    fn take(&mut self) -> Vec<Change> {
        self.last_event = None;
        let mut changes: Vec<Change> = self.pending.drain().collect();
        changes.sort_by_key(|c| !matches!(c, Change::Config));
        changes
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            self.window
        }
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Running watcher. Dropping it stops the watch thread.
pub struct WatchHandle {
    // Dropped first: closes the event channel, which ends the loop.
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        drop(self.watcher.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log!("watch"; "watch thread panicked");
        }
    }
}

pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Start watching the cache's blog root on a background thread.
    pub fn spawn(cache: Arc<ContentCache>) -> Result<WatchHandle> {
        let root = cache.paths().root().to_path_buf();
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        log!("watch"; "watching {}", root.display());

        let thread = thread::Builder::new()
            .name("folio-watch".into())
            .spawn(move || event_loop(&rx, &cache, &root))
            .context("Failed to spawn watch thread")?;

        Ok(WatchHandle {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }
}

fn event_loop(rx: &mpsc::Receiver<notify::Result<Event>>, cache: &ContentCache, root: &Path) {
    let mut debouncer = Debouncer::new(Duration::from_millis(DEBOUNCE_MS));

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) => {
                for path in &event.paths {
                    if let Some(change) = classify(&event.kind, path, root) {
                        debouncer.add(change);
                    }
                }
            }
            Ok(Err(e)) => debug!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                for change in debouncer.take() {
                    report(&change, cache.apply(&change));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn report(change: &Change, outcome: ReloadOutcome) {
    let what = match change {
        Change::Config => CONFIG_FILE.to_owned(),
        Change::Entry(name) => format!("{ENTRIES_DIR}/{name}.{MARKDOWN_EXT}"),
        Change::Page(filename) => format!("{PAGES_DIR}/{filename}"),
    };
    match outcome {
        ReloadOutcome::Failed => log!("watch"; "{what} changed, reload failed"),
        ReloadOutcome::Ignored | ReloadOutcome::Unchanged => {
            debug!("watch"; "{what} changed, nothing to do");
        }
        ReloadOutcome::Updated | ReloadOutcome::Removed => debug!("watch"; "{what} applied"),
    }
}
