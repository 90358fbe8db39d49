//! Front-matter extraction.
//!
//! Documents open with an optional metadata block:
//!
//! ```text
//! ---
//! Title: Hello world
//! Tags: rust
//!       blogging
//! ---
//! Body starts here.
//! ```
//!
//! Keys are lower-cased; an indented line continues the previous key with
//! another value. The block ends at the first blank line or closing fence
//! (`---` or `...`). A first line that is neither a key nor a fence means
//! there is no metadata at all.

use regex::Regex;
use std::{collections::BTreeMap, sync::LazyLock};

/// Front-matter key → values, in key order.
pub type Metadata = BTreeMap<String, Vec<String>>;

static BEGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3}([ \t].*)?$").expect("valid regex"));
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-{3}|\.{3})([ \t].*)?$").expect("valid regex"));
static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ ]{0,3}(?P<key>[A-Za-z0-9_-]+):[ \t]*(?P<value>.*)$").expect("valid regex")
});
static MORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{4,}(?P<value>.*)$").expect("valid regex"));

/// Split `source` into its metadata and the remaining markdown body.
pub fn split_front_matter(source: &str) -> (Metadata, &str) {
    let mut meta = Metadata::new();
    let mut rest = source;
    let mut last_key: Option<String> = None;

    if let Some((first, tail)) = next_line(rest)
        && BEGIN_RE.is_match(first)
    {
        rest = tail;
    }

    while let Some((line, tail)) = next_line(rest) {
        if line.trim().is_empty() || END_RE.is_match(line) {
            rest = tail;
            break;
        }

        if let Some(caps) = KEY_RE.captures(line) {
            let key = caps["key"].trim().to_lowercase();
            let value = caps["value"].trim().to_owned();
            meta.entry(key.clone()).or_default().push(value);
            last_key = Some(key);
        } else if let (Some(caps), Some(key)) = (MORE_RE.captures(line), last_key.as_ref()) {
            if let Some(values) = meta.get_mut(key) {
                values.push(caps["value"].trim().to_owned());
            }
        } else {
            break;
        }
        rest = tail;
    }

    (meta, rest)
}

/// Pop one line (without its terminator) off `text`.
fn next_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    let (line, tail) = match text.find('\n') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    };
    Some((line.strip_suffix('\r').unwrap_or(line), tail))
}
