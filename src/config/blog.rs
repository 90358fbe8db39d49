//! Blog configuration (`config.yml`).
//!
//! # Example
//!
//! ```yaml
//! entries:          # canonical order, oldest first
//!   - intro
//!   - followup
//! frontpage:
//!   mode: entry     # or `latest`
//!   entry: intro
//! password: hunter2 # reload secret
//! ```

use super::error::ConfigError;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Which document is shown at the blog front page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontPageMode {
    /// A fixed entry named by `frontpage.entry`.
    Entry,
    /// The newest entry (last in `entries`).
    Latest,
}

/// On-disk shape of the config, shared by `config.yml` and the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBlogConfig {
    entries: Vec<String>,
    frontpage: RawFrontPage,
    password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFrontPage {
    mode: FrontPageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entry: Option<String>,
}

/// Validated blog configuration.
///
/// `reversed_entry_slugs` is derived from `entry_slugs` at construction and is
/// never mutated on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlogConfig", into = "RawBlogConfig")]
pub struct BlogConfig {
    entry_slugs: Vec<String>,
    reversed_entry_slugs: Vec<String>,
    front_page_mode: FrontPageMode,
    front_page_entry: Option<String>,
    reload_secret: String,
}

impl BlogConfig {
    /// Build a config, enforcing the same rules as loading from disk.
    pub fn new(
        entry_slugs: Vec<String>,
        front_page_mode: FrontPageMode,
        front_page_entry: Option<String>,
        reload_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::try_from(RawBlogConfig {
            entries: entry_slugs,
            frontpage: RawFrontPage {
                mode: front_page_mode,
                entry: front_page_entry,
            },
            password: reload_secret.into(),
        })
    }

    /// Parse and validate YAML source text.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawBlogConfig = serde_yaml::from_str(content)
            .map_err(|err| ConfigError::Yaml(origin.to_path_buf(), err))?;
        Self::try_from(raw)
    }

    /// Entry slugs in canonical order (oldest first).
    #[inline]
    pub fn entry_slugs(&self) -> &[String] {
        &self.entry_slugs
    }

    /// Entry slugs newest first.
    #[inline]
    pub fn reversed_entry_slugs(&self) -> &[String] {
        &self.reversed_entry_slugs
    }

    #[inline]
    pub const fn front_page_mode(&self) -> FrontPageMode {
        self.front_page_mode
    }

    pub fn front_page_entry(&self) -> Option<&str> {
        self.front_page_entry.as_deref()
    }

    #[inline]
    pub fn reload_secret(&self) -> &str {
        &self.reload_secret
    }

    /// Find the declared slug matching `name`, ignoring ASCII case.
    pub fn declared_slug(&self, name: &str) -> Option<&str> {
        self.entry_slugs
            .iter()
            .find(|slug| slug.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Slug whose document is shown at the front page.
    ///
    /// `None` only in `latest` mode with no declared entries.
    pub fn front_page_slug(&self) -> Option<&str> {
        match self.front_page_mode {
            FrontPageMode::Entry => self.front_page_entry.as_deref(),
            FrontPageMode::Latest => self.entry_slugs.last().map(String::as_str),
        }
    }
}

impl TryFrom<RawBlogConfig> for BlogConfig {
    type Error = ConfigError;

    fn try_from(raw: RawBlogConfig) -> Result<Self, Self::Error> {
        if raw.password.is_empty() {
            return Err(ConfigError::Validation("`password` must not be empty".into()));
        }

        let mut seen = FxHashSet::default();
        for slug in &raw.entries {
            if slug.trim().is_empty() {
                return Err(ConfigError::Validation("`entries` contains an empty slug".into()));
            }
            if !seen.insert(slug.to_lowercase()) {
                return Err(ConfigError::Validation(format!("duplicate entry `{slug}`")));
            }
        }

        let front_page_entry = raw.frontpage.entry.filter(|e| !e.is_empty());
        if raw.frontpage.mode == FrontPageMode::Entry && front_page_entry.is_none() {
            return Err(ConfigError::Validation(
                "`frontpage.entry` is required when `frontpage.mode` is `entry`".into(),
            ));
        }

        let reversed_entry_slugs = raw.entries.iter().rev().cloned().collect();

        Ok(Self {
            entry_slugs: raw.entries,
            reversed_entry_slugs,
            front_page_mode: raw.frontpage.mode,
            front_page_entry,
            reload_secret: raw.password,
        })
    }
}

impl From<BlogConfig> for RawBlogConfig {
    fn from(config: BlogConfig) -> Self {
        Self {
            entries: config.entry_slugs,
            frontpage: RawFrontPage {
                mode: config.front_page_mode,
                entry: config.front_page_entry,
            },
            password: config.reload_secret,
        }
    }
}

// ============================================================================
// ConfigStore
// ============================================================================

/// Loads `config.yml`, remembering the hash of the last good load.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    last_hash: Mutex<Option<blake3::Hash>>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_hash: Mutex::new(None),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the config. All-or-nothing.
    pub fn load(&self) -> Result<BlogConfig, ConfigError> {
        let (config, hash) = self.read()?;
        *self.last_hash.lock() = Some(hash);
        Ok(config)
    }

    /// Like [`load`](Self::load), but returns `None` when the source bytes
    /// are identical to the last successful load.
    pub fn load_if_changed(&self) -> Result<Option<BlogConfig>, ConfigError> {
        let content = self.read_bytes()?;
        let hash = blake3::hash(&content);
        if *self.last_hash.lock() == Some(hash) {
            return Ok(None);
        }

        let config = self.parse(&content)?;
        *self.last_hash.lock() = Some(hash);
        Ok(Some(config))
    }

    fn read(&self) -> Result<(BlogConfig, blake3::Hash), ConfigError> {
        let content = self.read_bytes()?;
        let hash = blake3::hash(&content);
        Ok((self.parse(&content)?, hash))
    }

    fn read_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        fs::read(&self.path).map_err(|err| ConfigError::Io(self.path.clone(), err))
    }

    fn parse(&self, content: &[u8]) -> Result<BlogConfig, ConfigError> {
        let text = std::str::from_utf8(content).map_err(|err| {
            ConfigError::Io(
                self.path.clone(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            )
        })?;
        BlogConfig::from_yaml(text, &self.path)
    }
}
