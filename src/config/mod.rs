//! Configuration.
//!
//! | Source       | Type        | Purpose                                   |
//! |--------------|-------------|-------------------------------------------|
//! | `config.yml` | `BlogConfig`| Entry order, front page, reload secret    |
//! | `folio.toml` | `Settings`  | Content root, server, store (optional)    |

mod blog;
pub mod defaults;
mod error;
pub mod paths;
mod settings;

pub use blog::{BlogConfig, ConfigStore, FrontPageMode};
pub use error::ConfigError;
pub use paths::ContentPaths;
pub use settings::{ServeSettings, Settings, SiteSettings, StoreMode, StoreSettings};
