//! Folio - a markdown blog server with a live-reloading content cache.
//!
//! | Module     | Role                                                   |
//! |------------|--------------------------------------------------------|
//! | `config`   | `config.yml` (`BlogConfig`) and `folio.toml` settings  |
//! | `document` | Markdown parsing with front-matter metadata            |
//! | `cache`    | Snapshot cache, incremental reloads, latest view       |
//! | `store`    | Memory and durable (redb) backends                     |
//! | `watch`    | File watcher feeding changes into the cache            |
//! | `serve`    | HTTP front end                                         |

pub mod cache;
pub mod config;
pub mod document;
pub mod logger;
pub mod serve;
pub mod store;
pub mod utils;
pub mod watch;
