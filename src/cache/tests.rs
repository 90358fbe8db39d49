use super::*;
use crate::{
    config::ConfigError,
    store::{DurableBackend, FileLock},
};
use std::{fs, path::Path};
use tempfile::TempDir;

// ============================================================================
// Fixture
// ============================================================================

/// A throwaway blog root with `config.yml`, `entries/` and `pages/`.
struct Blog {
    dir: TempDir,
}

impl Blog {
    fn new(entries: &[&str]) -> Self {
        let blog = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fs::create_dir_all(blog.root().join("entries")).unwrap();
        fs::create_dir_all(blog.root().join("pages")).unwrap();
        blog.write_config(entries, "mode: latest");
        for slug in entries {
            blog.write_entry(slug, &format!("{} title", capitalized(slug)));
        }
        blog
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn paths(&self) -> ContentPaths {
        ContentPaths::new(self.root())
    }

    fn write_config(&self, entries: &[&str], frontpage: &str) {
        let list = entries
            .iter()
            .map(|e| format!("  - {e}\n"))
            .collect::<String>();
        let list = if list.is_empty() { " []\n".to_owned() } else { format!("\n{list}") };
        let yaml = format!("entries:{list}frontpage:\n  {}\npassword: letmein\n", frontpage.replace('\n', "\n  "));
        fs::write(self.root().join("config.yml"), yaml).unwrap();
    }

    fn write_entry(&self, slug: &str, title: &str) {
        let body = format!("Title: {title}\n\nBody of {slug}.\n");
        fs::write(self.root().join("entries").join(format!("{slug}.md")), body).unwrap();
    }

    fn write_untitled_entry(&self, slug: &str) {
        fs::write(
            self.root().join("entries").join(format!("{slug}.md")),
            "No metadata here.\n",
        )
        .unwrap();
    }

    fn corrupt_entry(&self, slug: &str) {
        fs::write(
            self.root().join("entries").join(format!("{slug}.md")),
            [0xff, 0xfe, 0xfd],
        )
        .unwrap();
    }

    fn remove_entry(&self, slug: &str) {
        fs::remove_file(self.root().join("entries").join(format!("{slug}.md"))).unwrap();
    }

    fn write_page(&self, filename: &str, title: &str) {
        let body = format!("Title: {title}\n\nPage {filename}.\n");
        fs::write(self.root().join("pages").join(filename), body).unwrap();
    }

    fn cache(&self) -> ContentCache {
        ContentCache::builder(self.paths()).build().unwrap()
    }
}

fn capitalized(slug: &str) -> String {
    let mut chars = slug.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn latest_urls(cache: &ContentCache) -> Vec<String> {
    cache.get_latest().iter().map(|l| l.url.clone()).collect()
}

// ============================================================================
// Full reload and latest view
// ============================================================================

#[test]
fn test_latest_scenario() {
    let blog = Blog::new(&["intro", "followup"]);
    let cache = blog.cache();

    assert_eq!(
        &*cache.get_latest(),
        [
            LatestEntry {
                title: "Followup title".into(),
                url: "/blog/entry/followup".into(),
            },
            LatestEntry {
                title: "Intro title".into(),
                url: "/blog/entry/intro".into(),
            },
        ]
    );
}

#[test]
fn test_latest_bounded_and_titled() {
    let slugs: Vec<String> = (0..12).map(|i| format!("post{i:02}")).collect();
    let refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
    let blog = Blog::new(&refs);
    blog.write_untitled_entry("post10");
    blog.remove_entry("post08");

    let cache = blog.cache();
    let latest = cache.get_latest();

    assert_eq!(latest.len(), LATEST_LIMIT);
    assert!(latest.iter().all(|l| !l.title.is_empty()));
    assert_eq!(
        latest_urls(&cache)[..3],
        ["/blog/entry/post11", "/blog/entry/post09", "/blog/entry/post07"]
    );
    for item in latest.iter() {
        let slug = item.url.trim_start_matches("/blog/entry/");
        assert!(cache.get_entry(slug).is_ok());
    }
}

#[test]
fn test_full_reload_isolates_bad_files() {
    let blog = Blog::new(&["good", "bad"]);
    blog.corrupt_entry("bad");
    blog.write_page("about.md", "About");
    fs::write(blog.root().join("pages").join("broken.md"), [0xff, 0xfe]).unwrap();

    let cache = blog.cache();
    assert!(cache.get_entry("good").is_ok());
    assert!(matches!(cache.get_entry("bad"), Err(CacheError::NotFound(_))));
    assert!(cache.get_page("about").is_ok());
    assert!(cache.get_page("broken").is_err());
}

#[test]
fn test_missing_config_fails_build() {
    let dir = tempfile::tempdir().unwrap();
    let result = ContentCache::builder(ContentPaths::new(dir.path())).build();
    assert!(matches!(result, Err(CacheError::Config(ConfigError::Io(..)))));
}

#[test]
fn test_full_reload_config_error_keeps_snapshot() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.snapshot();

    fs::write(blog.root().join("config.yml"), "entries: [").unwrap();
    assert!(matches!(cache.full_reload(), Err(CacheError::Config(_))));
    assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    assert!(cache.get_entry("intro").is_ok());
}

// ============================================================================
// Incremental entry reload
// ============================================================================

#[test]
fn test_reload_entry_updates_document_and_latest() {
    let blog = Blog::new(&["intro", "followup"]);
    let cache = blog.cache();

    blog.write_entry("intro", "Intro, revised");
    assert_eq!(cache.reload_entry("intro"), ReloadOutcome::Updated);

    let entry = cache.get_entry("intro").unwrap();
    assert_eq!(entry.document.title(), Some("Intro, revised"));
    assert_eq!(cache.get_latest()[1].title, "Intro, revised");
}

#[test]
fn test_reload_undeclared_entry_never_inserts() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    blog.write_entry("stray", "Stray");

    assert_eq!(cache.reload_entry("stray"), ReloadOutcome::Ignored);
    assert!(matches!(cache.get_entry("stray"), Err(CacheError::NotFound(_))));
    assert!(!cache.snapshot().entries().contains_key("stray"));
}

#[test]
fn test_deleted_entry_is_removed() {
    let blog = Blog::new(&["intro", "followup"]);
    let cache = blog.cache();

    blog.remove_entry("followup");
    assert_eq!(cache.reload_entry("followup"), ReloadOutcome::Removed);
    assert!(cache.get_entry("followup").is_err());
    assert_eq!(latest_urls(&cache), ["/blog/entry/intro"]);

    // Already gone
    assert_eq!(cache.reload_entry("followup"), ReloadOutcome::Ignored);
}

#[test]
fn test_bad_edit_keeps_previous_entry() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.get_entry("intro").unwrap();

    blog.corrupt_entry("intro");
    assert_eq!(cache.reload_entry("intro"), ReloadOutcome::Failed);
    assert_eq!(cache.get_entry("intro").unwrap(), before);
}

#[test]
fn test_untitled_entry_served_but_not_listed() {
    let blog = Blog::new(&["intro", "notes"]);
    let cache = blog.cache();

    blog.write_untitled_entry("notes");
    assert_eq!(cache.reload_entry("notes"), ReloadOutcome::Updated);
    assert!(cache.get_entry("notes").is_ok());
    assert_eq!(latest_urls(&cache), ["/blog/entry/intro"]);
}

#[test]
fn test_entry_lookup_tolerance() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();

    for key in ["intro", "INTRO", "Intro"] {
        assert_eq!(cache.get_entry(key).unwrap().slug, "intro");
    }
    assert!(cache.get_entry("outro").is_err());
}

// ============================================================================
// Pages
// ============================================================================

#[test]
fn test_page_lookup_tolerance() {
    let blog = Blog::new(&["intro"]);
    blog.write_page("my_page.md", "Mine");
    let cache = blog.cache();

    let a = cache.get_page("My_Page").unwrap();
    let b = cache.get_page("my page").unwrap();
    let c = cache.get_page("my_page").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(a.slug(), "my_page");

    let index = cache.get_page_index();
    assert_eq!(index.get("My Page").map(String::as_str), Some("/blog/page/my_page"));
}

#[test]
fn test_reload_page_lifecycle() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();

    blog.write_page("faq.md", "FAQ");
    assert_eq!(cache.reload_page("faq.md"), ReloadOutcome::Updated);
    assert_eq!(cache.get_page("faq").unwrap().document.title(), Some("FAQ"));
    assert!(cache.get_page_index().contains_key("Faq"));

    fs::remove_file(blog.root().join("pages").join("faq.md")).unwrap();
    assert_eq!(cache.reload_page("faq.md"), ReloadOutcome::Removed);
    assert!(cache.get_page("faq").is_err());
    assert!(cache.get_page_index().is_empty());
}

#[test]
fn test_reload_page_ignores_non_markdown() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.snapshot();

    fs::write(blog.root().join("pages").join("notes.txt"), "plain").unwrap();
    assert_eq!(cache.reload_page("notes.txt"), ReloadOutcome::Ignored);
    assert_eq!(cache.reload_page("missing.md"), ReloadOutcome::Ignored);
    assert!(Arc::ptr_eq(&before, &cache.snapshot()));
}

// ============================================================================
// Config reload
// ============================================================================

#[test]
fn test_reload_config_purges_and_readds() {
    let blog = Blog::new(&["intro", "followup"]);
    let cache = blog.cache();

    blog.write_config(&["intro"], "mode: latest");
    assert_eq!(cache.reload_config().unwrap(), ReloadOutcome::Updated);
    assert!(cache.get_entry("followup").is_err());
    assert_eq!(latest_urls(&cache), ["/blog/entry/intro"]);

    // File untouched, but an entry reload alone does not bring it back
    assert_eq!(cache.reload_entry("followup"), ReloadOutcome::Ignored);

    blog.write_config(&["intro", "followup"], "mode: latest");
    assert_eq!(cache.reload_config().unwrap(), ReloadOutcome::Updated);
    assert!(cache.get_entry("followup").is_ok());
    assert_eq!(latest_urls(&cache), ["/blog/entry/followup", "/blog/entry/intro"]);
}

#[test]
fn test_reload_config_reorders_latest() {
    let blog = Blog::new(&["a", "b", "c"]);
    let cache = blog.cache();

    blog.write_config(&["c", "a", "b"], "mode: latest");
    cache.reload_config().unwrap();
    assert_eq!(
        latest_urls(&cache),
        ["/blog/entry/b", "/blog/entry/a", "/blog/entry/c"]
    );
}

#[test]
fn test_reload_config_unchanged_is_noop() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.snapshot();

    assert_eq!(cache.reload_config().unwrap(), ReloadOutcome::Unchanged);
    assert!(Arc::ptr_eq(&before, &cache.snapshot()));
}

#[test]
fn test_reload_config_error_keeps_state() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.snapshot();

    fs::write(blog.root().join("config.yml"), "password: x\n").unwrap();
    assert!(cache.reload_config().is_err());
    assert_eq!(cache.apply(&Change::Config), ReloadOutcome::Failed);
    assert!(Arc::ptr_eq(&before, &cache.snapshot()));
}

// ============================================================================
// Front page and reload secret
// ============================================================================

#[test]
fn test_front_page_modes() {
    let blog = Blog::new(&["intro", "followup"]);
    blog.write_config(&["intro", "followup"], "mode: entry\nentry: intro");
    let cache = blog.cache();
    assert_eq!(cache.front_page_document().unwrap().slug, "intro");

    blog.write_config(&["intro", "followup"], "mode: latest");
    cache.reload_config().unwrap();
    assert_eq!(cache.front_page_document().unwrap().slug, "followup");
}

#[test]
fn test_front_page_dangling_reference() {
    let blog = Blog::new(&["intro"]);
    blog.write_config(&["intro"], "mode: entry\nentry: ghost");
    let cache = blog.cache();
    assert!(matches!(
        cache.front_page_document(),
        Err(CacheError::NotFound(slug)) if slug == "ghost"
    ));
}

#[test]
fn test_reload_wrong_secret_leaves_cache_unchanged() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();
    let before = cache.snapshot();

    blog.write_entry("intro", "Changed on disk");
    let err = cache.reload("wrong-secret").unwrap_err();
    assert!(matches!(err, CacheError::Unauthorized));
    assert!(err.is_not_found());
    assert!(Arc::ptr_eq(&before, &cache.snapshot()));

    cache.reload("letmein").unwrap();
    assert!(!Arc::ptr_eq(&before, &cache.snapshot()));
    assert_eq!(
        cache.get_entry("intro").unwrap().document.title(),
        Some("Changed on disk")
    );
}

#[test]
fn test_apply_dispatch() {
    let blog = Blog::new(&["intro"]);
    let cache = blog.cache();

    blog.write_entry("intro", "Via watcher");
    assert_eq!(cache.apply(&Change::Entry("intro".into())), ReloadOutcome::Updated);
    blog.write_page("contact.md", "Contact");
    assert_eq!(cache.apply(&Change::Page("contact.md".into())), ReloadOutcome::Updated);
    assert_eq!(cache.apply(&Change::Config), ReloadOutcome::Unchanged);
}

#[test]
fn test_snapshot_stays_consistent_for_holders() {
    let blog = Blog::new(&["intro", "followup"]);
    let cache = blog.cache();
    let held = cache.snapshot();

    blog.write_config(&["intro"], "mode: latest");
    cache.reload_config().unwrap();

    // The old snapshot still pairs its own config with its own view
    assert_eq!(held.config().entry_slugs().len(), 2);
    assert_eq!(held.latest().len(), 2);
    assert_eq!(cache.snapshot().latest().len(), 1);
}

// ============================================================================
// Durable backend
// ============================================================================

fn durable_cache(blog: &Blog, store: &Path) -> ContentCache {
    let backend = DurableBackend::open(store).unwrap();
    ContentCache::builder(blog.paths())
        .backend(Arc::new(backend))
        .build()
        .unwrap()
}

#[test]
fn test_durable_cross_instance_visibility() {
    let blog = Blog::new(&["intro", "followup"]);
    let store = tempfile::tempdir().unwrap();

    let writer = durable_cache(&blog, store.path());
    let reader = durable_cache(&blog, store.path());

    blog.write_entry("intro", "Written elsewhere");
    assert_eq!(writer.reload_entry("intro"), ReloadOutcome::Updated);

    let seen = reader.get_entry("intro").unwrap();
    assert_eq!(seen.document.title(), Some("Written elsewhere"));
    assert_eq!(reader.get_latest()[1].title, "Written elsewhere");
}

#[test]
fn test_durable_generation_advances() {
    let blog = Blog::new(&["intro"]);
    let store = tempfile::tempdir().unwrap();

    let cache = durable_cache(&blog, store.path());
    let first = cache.snapshot().generation();
    cache.full_reload().unwrap();
    assert!(cache.snapshot().generation() > first);

    // A second process starting up continues from the stored generation
    let other = durable_cache(&blog, store.path());
    assert!(other.snapshot().generation() > cache.current.load().generation());
}

#[test]
fn test_durable_commit_builds_on_newest() {
    let blog = Blog::new(&["intro", "followup"]);
    let store = tempfile::tempdir().unwrap();

    let a = durable_cache(&blog, store.path());
    let b = durable_cache(&blog, store.path());

    blog.write_entry("intro", "Edited via A");
    assert_eq!(a.reload_entry("intro"), ReloadOutcome::Updated);

    // B commits without reading first; its commit must include A's edit.
    blog.write_entry("followup", "Edited via B");
    assert_eq!(b.reload_entry("followup"), ReloadOutcome::Updated);

    for cache in [&a, &b] {
        assert_eq!(
            cache.get_entry("intro").unwrap().document.title(),
            Some("Edited via A")
        );
        assert_eq!(
            cache.get_entry("followup").unwrap().document.title(),
            Some("Edited via B")
        );
        let titles: Vec<String> = cache.get_latest().iter().map(|l| l.title.clone()).collect();
        assert_eq!(titles, ["Edited via B", "Edited via A"]);
    }
    assert_eq!(
        a.snapshot().generation(),
        b.snapshot().generation()
    );

    // A third process starting from the store alone sees the same latest view
    let restored = Mirror::new(Arc::new(DurableBackend::open(store.path()).unwrap()))
        .read_all()
        .unwrap()
        .unwrap();
    assert_eq!(restored.latest(), &*a.get_latest());
}

#[test]
fn test_durable_reader_skips_refresh_during_commit() {
    let blog = Blog::new(&["intro"]);
    let store = tempfile::tempdir().unwrap();

    let writer = durable_cache(&blog, store.path());
    let reader = durable_cache(&blog, store.path());
    let before = reader.snapshot();

    blog.write_entry("intro", "Committed");
    assert_eq!(writer.reload_entry("intro"), ReloadOutcome::Updated);

    // Another committer holds the lock: the reader keeps its snapshot
    // instead of blocking or reading tables mid-commit.
    let held = FileLock::exclusive(&store.path().join("commit.lock")).unwrap();
    assert!(Arc::ptr_eq(&before, &reader.snapshot()));
    drop(held);

    assert_eq!(
        reader.get_entry("intro").unwrap().document.title(),
        Some("Committed")
    );
}

// ============================================================================
// Page name collisions
// ============================================================================

#[test]
fn test_page_collision_first_file_wins() {
    let blog = Blog::new(&["intro"]);
    blog.write_page("about.md", "Lower");
    blog.write_page("About.md", "Upper");

    for _ in 0..3 {
        let cache = blog.cache();
        let page = cache.get_page("about").unwrap();
        assert_eq!(page.name, "About");
        assert_eq!(page.document.title(), Some("Upper"));
        assert_eq!(cache.get_page_index().len(), 1);
    }
}
