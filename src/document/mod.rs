//! Parsed markdown documents.
//!
//! A [`ParsedDocument`] is produced by a [`DocumentParser`] and never changes
//! afterwards. [`StoredDocument`] is its durable projection: only the HTML
//! body and metadata survive persistence, derived attributes such as the
//! outline are dropped.

mod markdown;
pub mod meta;

pub use markdown::MarkdownParser;
pub use meta::Metadata;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A file that could not be turned into a document.
#[derive(Debug, Error)]
#[error("failed to parse `{path}`")]
pub struct ParseError {
    pub path: PathBuf,
    #[source]
    pub cause: std::io::Error,
}

impl ParseError {
    pub fn new(path: &Path, cause: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            cause,
        }
    }

    /// True when the file no longer exists.
    pub fn is_missing(&self) -> bool {
        self.cause.kind() == std::io::ErrorKind::NotFound
    }
}

/// Converts a markdown file into a document. Pure apart from reading `path`.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError>;
}

/// A heading in the document body, used for tables of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// HTML body plus front-matter metadata, and attributes derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    html: String,
    metadata: Metadata,
    outline: Vec<Heading>,
}

impl ParsedDocument {
    pub fn new(html: String, metadata: Metadata, outline: Vec<Heading>) -> Self {
        Self {
            html,
            metadata,
            outline,
        }
    }

    #[inline]
    pub fn html(&self) -> &str {
        &self.html
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[inline]
    pub fn outline(&self) -> &[Heading] {
        &self.outline
    }

    /// First value of `key`.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)?.first().map(String::as_str)
    }

    /// The document title, if present and non-empty.
    pub fn title(&self) -> Option<&str> {
        self.meta("title").filter(|t| !t.trim().is_empty())
    }
}

/// Durable form of a [`ParsedDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub html: String,
    pub metadata: Metadata,
}

impl From<&ParsedDocument> for StoredDocument {
    fn from(doc: &ParsedDocument) -> Self {
        Self {
            html: doc.html.clone(),
            metadata: doc.metadata.clone(),
        }
    }
}

impl From<StoredDocument> for ParsedDocument {
    fn from(stored: StoredDocument) -> Self {
        Self::new(stored.html, stored.metadata, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: Option<&str>) -> ParsedDocument {
        let mut metadata = Metadata::new();
        if let Some(title) = title {
            metadata.insert("title".into(), vec![title.into()]);
        }
        ParsedDocument::new(
            "<p>hi</p>".into(),
            metadata,
            vec![Heading {
                level: 1,
                text: "Hi".into(),
            }],
        )
    }

    #[test]
    fn test_title() {
        assert_eq!(doc(Some("Hello")).title(), Some("Hello"));
        assert_eq!(doc(Some("  ")).title(), None);
        assert_eq!(doc(None).title(), None);
    }

    #[test]
    fn test_stored_projection_drops_outline() {
        let original = doc(Some("Hello"));
        let stored = StoredDocument::from(&original);
        assert_eq!(stored.html, original.html());
        assert_eq!(&stored.metadata, original.metadata());

        let restored = ParsedDocument::from(stored);
        assert!(restored.outline().is_empty());
        assert_eq!(restored.title(), Some("Hello"));
    }

    #[test]
    fn test_parse_error_missing() {
        let err = ParseError::new(
            Path::new("gone.md"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_missing());
        assert!(err.to_string().contains("gone.md"));
    }
}
