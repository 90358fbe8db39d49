//! Centralized path and URL resolution for the blog content tree.
//!
//! # Layout
//!
//! ```text
//! blog/
//!  ├── config.yml        → ContentPaths::config_file()
//!  ├── entries/<slug>.md → ContentPaths::entry_file(slug)
//!  └── pages/<name>.md   → ContentPaths::page_file(filename)
//! ```

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yml";
pub const ENTRIES_DIR: &str = "entries";
pub const PAGES_DIR: &str = "pages";
pub const MARKDOWN_EXT: &str = "md";

const ENTRY_URL_PREFIX: &str = "/blog/entry/";
const PAGE_URL_PREFIX: &str = "/blog/page/";

/// Resolves every content path from the blog root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPaths {
    root: PathBuf,
}

impl ContentPaths {
    /// `root` is made absolute, so it compares against watcher event paths.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_path(&root.into()),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn entries_dir(&self) -> PathBuf {
        self.root.join(ENTRIES_DIR)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(PAGES_DIR)
    }

    /// `entries/<slug>.md`
    pub fn entry_file(&self, slug: &str) -> PathBuf {
        self.entries_dir().join(format!("{slug}.{MARKDOWN_EXT}"))
    }

    /// `pages/<filename>`, where `filename` keeps its extension.
    pub fn page_file(&self, filename: &str) -> PathBuf {
        self.pages_dir().join(filename)
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        // For non-existent paths, manually make them absolute
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// URL of an entry: `/blog/entry/<slug>`
pub fn entry_url(slug: &str) -> String {
    format!("{ENTRY_URL_PREFIX}{slug}")
}

/// URL of a page: `/blog/page/<name>`
pub fn page_url(name: &str) -> String {
    format!("{PAGE_URL_PREFIX}{name}")
}
