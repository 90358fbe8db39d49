//! Slug derivation and tolerant key lookup.
//!
//! | Input            | Function           | Output          |
//! |------------------|--------------------|-----------------|
//! | `My_Page.md`     | `page_name`        | `My_Page`       |
//! | `My_Page`        | `slug_of`          | `my_page`       |
//! | `my_page`        | `friendly_title`   | `My Page`       |
//! | `My_Page`        | `lookup_candidates`| `my_page`, `my page` |

use crate::config::paths::MARKDOWN_EXT;
use std::path::Path;

/// Page name from a file name: everything before the first `.`, provided the
/// file is markdown. `None` for other files.
pub fn page_name(filename: &str) -> Option<&str> {
    let is_markdown = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MARKDOWN_EXT));
    if !is_markdown {
        return None;
    }
    filename.split('.').next().filter(|name| !name.is_empty())
}

/// Canonical lookup key for an entry or page name.
#[inline]
pub fn slug_of(name: &str) -> String {
    name.to_lowercase()
}

/// Menu title of a page: underscores become spaces, each word capitalized.
///
/// ASCII-only casing, so `élan` stays lower-case at its first letter.
pub fn friendly_title(name: &str) -> String {
    name.replace('_', " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(word.len());
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
            out
        }
        None => String::new(),
    }
}

/// Keys to try, in order, for a requested entry or page.
///
/// The lower-cased key first, then with underscores as spaces, then with
/// spaces as underscores. Duplicates are removed.
pub fn lookup_candidates(requested: &str) -> Vec<String> {
    let lower = requested.to_lowercase();
    let spaced = lower.replace('_', " ");
    let underscored = lower.replace(' ', "_");

    let mut candidates = vec![lower];
    for key in [spaced, underscored] {
        if !candidates.contains(&key) {
            candidates.push(key);
        }
    }
    candidates
}
