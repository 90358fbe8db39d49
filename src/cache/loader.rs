//! Parsing entries and pages from disk.
//!
//! Failures are isolated per file: a file that cannot be parsed is logged and
//! left out of the result, it never aborts the surrounding reload.

use super::snapshot::{Entry, EntryTable, Page, PageTable};
use crate::{
    config::ContentPaths,
    debug,
    document::DocumentParser,
    log,
    utils::slug::{page_name, slug_of},
};
use rayon::prelude::*;
use std::{collections::hash_map::Entry as Slot, sync::Arc};
use walkdir::WalkDir;

pub(super) struct Loader<'a> {
    paths: &'a ContentPaths,
    parser: &'a dyn DocumentParser,
}

impl<'a> Loader<'a> {
    pub(super) const fn new(paths: &'a ContentPaths, parser: &'a dyn DocumentParser) -> Self {
        Self { paths, parser }
    }

    /// Parse `entries/<slug>.md`.
    pub(super) fn entry(&self, slug: &str) -> Option<Arc<Entry>> {
        match self.parser.parse(&self.paths.entry_file(slug)) {
            Ok(document) => {
                debug!("entries"; "parsed {slug}");
                Some(Arc::new(Entry {
                    slug: slug.to_owned(),
                    document,
                }))
            }
            Err(err) if err.is_missing() => {
                log!("warn"; "entry `{slug}` has no file at {}", err.path.display());
                None
            }
            Err(err) => {
                log!("warn"; "unable to parse entry `{slug}`: {}", err.cause);
                None
            }
        }
    }

    /// Parse every slug in parallel, keyed by canonical slug.
    pub(super) fn entries<'s>(&self, slugs: impl IntoIterator<Item = &'s String>) -> EntryTable {
        let slugs: Vec<&String> = slugs.into_iter().collect();
        slugs
            .par_iter()
            .filter_map(|slug| self.entry(slug))
            .map(|entry| (slug_of(&entry.slug), entry))
            .collect()
    }

    /// Parse `pages/<filename>`. Non-markdown files yield `None` silently.
    pub(super) fn page(&self, filename: &str) -> Option<Arc<Page>> {
        let name = page_name(filename)?;
        match self.parser.parse(&self.paths.page_file(filename)) {
            Ok(document) => {
                debug!("pages"; "parsed {name}");
                Some(Arc::new(Page::new(name, document)))
            }
            Err(err) => {
                log!("warn"; "unable to parse page `{name}`: {}", err.cause);
                None
            }
        }
    }

    /// Parse every markdown file directly inside the pages directory.
    pub(super) fn pages(&self) -> PageTable {
        let dir = self.paths.pages_dir();
        if !dir.is_dir() {
            debug!("pages"; "no pages directory at {}", dir.display());
            return PageTable::default();
        }

        let files: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .collect();

        let parsed: Vec<Arc<Page>> = files
            .par_iter()
            .filter_map(|filename| self.page(filename))
            .collect();

        // Names differing only in case share a slug; the first file wins.
        let mut table = PageTable::default();
        for page in parsed {
            match table.entry(page.slug()) {
                Slot::Vacant(slot) => {
                    slot.insert(page);
                }
                Slot::Occupied(kept) => {
                    log!("warn"; "page `{}` collides with `{}`, keeping the first", page.name, kept.get().name);
                }
            }
        }
        table
    }
}
