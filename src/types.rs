//! Page records shared by the loader, the renderer, and the writer.
//!
//! A page is either an *article* (a markdown body plus metadata) or a
//! *directory* (an optional listing of child pages). Metadata is read from a
//! JSON sidecar file and handed to the binder as-is, so any extra keys a
//! metadata file carries reach the template too.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Every page of a run, keyed by its source-tree path.
pub type Pages = BTreeMap<PathBuf, Page>;

/// Author records keyed by author id.
pub type AuthorRegistry = BTreeMap<String, AuthorRecord>;

/// One logical output page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Raw markdown body; replaced by the final HTML once rendered.
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
    /// Child page paths, present only for directory pages.
    pub listing: Option<Vec<String>>,
}

impl Page {
    /// Articles need both a non-empty body and metadata; everything else is
    /// rendered with the directory template.
    pub fn is_article(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty()) && self.metadata.is_some()
    }
}

/// Page metadata from a `.json` sidecar file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// A date string or a number of epoch milliseconds; parsed when bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub breadcrumb: Vec<String>,
    /// Keys without a dedicated field; bound like any other value.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    /// Metadata used for directory pages that have none: a single root crumb.
    pub fn root() -> Self {
        Self {
            breadcrumb: vec![".".to_string()],
            ..Self::default()
        }
    }

    /// Whether a usable date is present (`null` and `""` count as missing).
    pub fn has_date(&self) -> bool {
        match &self.date {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Replace an author id with its registry record.
    ///
    /// Unknown ids become a record carrying only the id as name.
    pub fn resolve_author(&mut self, authors: &AuthorRegistry) {
        if let Some(Author::Id(id)) = &self.author {
            let record = authors
                .get(id)
                .cloned()
                .unwrap_or_else(|| AuthorRecord::named(id));
            self.author = Some(Author::Record(record));
        }
    }
}

/// Either an author id (as written in metadata) or the resolved record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Id(String),
    Record(AuthorRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    /// GitHub handle, linked from article bylines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorRecord {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> AuthorRegistry {
        let mut authors = AuthorRegistry::new();
        authors.insert(
            "marak".to_string(),
            AuthorRecord {
                name: "Marak Squires".to_string(),
                github: Some("marak".to_string()),
                ..AuthorRecord::default()
            },
        );
        authors
    }

    #[test]
    fn metadata_parses_sidecar_json() {
        let meta: Metadata = serde_json::from_value(json!({
            "title": "Streams",
            "date": "2011-04-12",
            "author": "marak",
            "tags": ["node", "streams"],
            "breadcrumb": ["articles", "streams"],
            "difficulty": 2
        }))
        .unwrap();
        assert_eq!(meta.title.as_deref(), Some("Streams"));
        assert_eq!(meta.author, Some(Author::Id("marak".to_string())));
        assert_eq!(meta.tags, vec!["node", "streams"]);
        assert_eq!(meta.extra.get("difficulty"), Some(&json!(2)));
    }

    #[test]
    fn numeric_date_is_accepted() {
        let meta: Metadata =
            serde_json::from_value(json!({ "date": 1302566400000_i64 })).unwrap();
        assert_eq!(meta.date, Some(json!(1302566400000_i64)));
        assert!(meta.has_date());
    }

    #[test]
    fn blank_dates_are_missing() {
        for date in [None, Some(json!(null)), Some(json!(""))] {
            let meta = Metadata {
                date,
                ..Metadata::default()
            };
            assert!(!meta.has_date());
        }
    }

    #[test]
    fn author_record_in_metadata_is_kept() {
        let meta: Metadata = serde_json::from_value(json!({
            "author": { "name": "Jane", "github": "jane" }
        }))
        .unwrap();
        assert!(matches!(meta.author, Some(Author::Record(ref r)) if r.name == "Jane"));
    }

    #[test]
    fn resolve_known_author() {
        let mut meta = Metadata {
            author: Some(Author::Id("marak".to_string())),
            ..Metadata::default()
        };
        meta.resolve_author(&registry());
        let Some(Author::Record(record)) = meta.author else {
            panic!("author not resolved");
        };
        assert_eq!(record.name, "Marak Squires");
        assert_eq!(record.github.as_deref(), Some("marak"));
    }

    #[test]
    fn resolve_unknown_author_synthesizes_record() {
        let mut meta = Metadata {
            author: Some(Author::Id("ghost".to_string())),
            ..Metadata::default()
        };
        meta.resolve_author(&registry());
        assert_eq!(
            meta.author,
            Some(Author::Record(AuthorRecord::named("ghost")))
        );
    }

    #[test]
    fn missing_title_and_date_are_not_serialized() {
        let value = serde_json::to_value(Metadata::root()).unwrap();
        assert_eq!(value, json!({ "tags": [], "breadcrumb": ["."] }));
    }

    #[test]
    fn article_requires_body_and_metadata() {
        let mut page = Page {
            content: Some("# Hi".to_string()),
            ..Page::default()
        };
        assert!(!page.is_article());
        page.metadata = Some(Metadata::default());
        assert!(page.is_article());
        page.content = Some(String::new());
        assert!(!page.is_article());
    }
}
