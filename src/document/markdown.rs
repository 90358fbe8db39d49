//! Comrak-backed [`DocumentParser`].

use super::{DocumentParser, Heading, ParseError, ParsedDocument, meta::split_front_matter};
use comrak::{markdown_to_html, options::Options};
use regex::Regex;
use std::{fs, path::Path, sync::LazyLock};

static ATX_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ ]{0,3}(?P<hashes>#{1,6})[ \t]+(?P<text>.*?)(?:[ \t]+#+)?[ \t]*$")
        .expect("valid regex")
});

/// Default parser: front matter, then comrak with the common extensions.
pub struct MarkdownParser {
    options: Options<'static>,
}

impl MarkdownParser {
    pub fn new() -> Self {
        let mut options = Options::default();

        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;
        ext.description_lists = true;
        ext.header_id_prefix = Some(String::new());

        options.parse.smart = true;
        options.render.r#unsafe = true;

        Self { options }
    }

    /// Render markdown source that has already been read.
    pub fn render(&self, source: &str) -> ParsedDocument {
        let (metadata, body) = split_front_matter(source);
        let html = markdown_to_html(body, &self.options)
            // Smart punctuation, except straight double quotes.
            .replace(['\u{201C}', '\u{201D}'], "\"");
        ParsedDocument::new(html, metadata, outline(body))
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for MarkdownParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        let source = fs::read_to_string(path).map_err(|err| ParseError::new(path, err))?;
        Ok(self.render(&source))
    }
}

/// ATX headings outside fenced code blocks.
fn outline(body: &str) -> Vec<Heading> {
    let mut in_fence = false;
    body.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .filter_map(|line| {
            let caps = ATX_HEADING_RE.captures(line)?;
            Some(Heading {
                level: caps["hashes"].len() as u8,
                text: caps["text"].to_owned(),
            })
        })
        .collect()
}
