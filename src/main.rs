//! Folio - a markdown blog server with a live-reloading content cache.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use folio::{
    cache::ContentCache,
    config::{ContentPaths, Settings, StoreMode},
    log,
    logger,
    serve::serve_blog,
    store::{Backend, DurableBackend, MemoryBackend},
};
use std::{path::Path, sync::Arc};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_verbose(cli.debug);

    let root = cli.root();
    let settings = load_settings(&cli, &root)?;
    let cache = Arc::new(build_cache(&root, &settings)?);

    match &cli.command {
        Commands::Serve { .. } => serve_blog(cache, &settings.serve),
        Commands::Check => {
            check(&cache);
            Ok(())
        }
    }
}

/// Load `folio.toml` (optional) and apply CLI overrides.
fn load_settings(cli: &Cli, root: &Path) -> Result<Settings> {
    let config_path = root.join(&cli.config);
    let mut settings = Settings::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    cli.update_settings(&mut settings);
    Ok(settings)
}

fn build_cache(root: &Path, settings: &Settings) -> Result<ContentCache> {
    let paths = ContentPaths::new(root.join(&settings.site.content));
    let backend: Arc<dyn Backend> = match settings.store.mode {
        StoreMode::Memory => Arc::new(MemoryBackend::new()),
        StoreMode::Durable => {
            let backend = DurableBackend::open(root.join(&settings.store.path))?;
            log!("store"; "durable store at {}", backend.dir().display());
            Arc::new(backend)
        }
    };

    ContentCache::builder(paths)
        .backend(backend)
        .build()
        .context("Failed to load blog content")
}

/// Print what a full reload produced, flagging declared entries that failed.
fn check(cache: &ContentCache) {
    let snapshot = cache.snapshot();
    let declared = snapshot.config().entry_slugs();

    let missing: Vec<&str> = declared
        .iter()
        .filter(|slug| snapshot.find_entry(slug).is_none())
        .map(String::as_str)
        .collect();

    log!("check"; "{} of {} entries parsed", declared.len() - missing.len(), declared.len());
    for slug in &missing {
        log!("warn"; "entry `{slug}` not available");
    }
    log!("check"; "{} pages: {}", snapshot.pages().len(),
        snapshot.page_index().keys().cloned().collect::<Vec<_>>().join(", "));
    for item in snapshot.latest() {
        log!("check"; "latest: {} ({})", item.title, item.url);
    }

    match cache.front_page_document() {
        Ok(entry) => log!("check"; "front page: {}", entry.url()),
        Err(err) => log!("warn"; "front page unavailable: {err}"),
    }
}
