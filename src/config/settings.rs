//! Process settings from `folio.toml`.
//!
//! # Example
//!
//! ```toml
//! [site]
//! content = "blog"
//!
//! [serve]
//! interface = "0.0.0.0"
//! port = 8080
//! watch = true
//!
//! [store]
//! mode = "durable"
//! path = ".folio-store"
//! ```

use super::{defaults, error::ConfigError};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root of `folio.toml`. Every section is optional.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub site: SiteSettings,

    #[serde(default)]
    pub serve: ServeSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

/// `[site]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSettings {
    /// Blog root holding `config.yml`, `entries/` and `pages/`.
    #[serde(default = "defaults::site::content")]
    #[educe(Default = defaults::site::content())]
    pub content: PathBuf,
}

/// `[serve]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeSettings {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Watch the blog root and reload changed files.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}

/// Where parsed content is mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Memory,
    Durable,
}

/// `[store]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    #[serde(default = "defaults::store::mode")]
    #[educe(Default = defaults::store::mode())]
    pub mode: StoreMode,

    /// Directory of the durable store (relative to the working directory).
    #[serde(default = "defaults::store::path")]
    #[educe(Default = defaults::store::path())]
    pub path: PathBuf,
}

impl Settings {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }
}
