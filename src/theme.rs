//! Theme templates.
//!
//! A theme is a directory holding two templates:
//!
//! | File | Used for |
//! |------|----------|
//! | `article.html` | pages with a markdown body and metadata |
//! | `directory.html` | every other page (directory listings) |
//!
//! Both are parsed once per run. Rendering clones the parsed tree for each
//! page, so templates are never mutated. When the theme directory does not
//! exist, the stock theme compiled into the binary is used.
//!
//! ## Template Contract
//!
//! Placeholders are found by class, id, or `name` attribute (see
//! [`crate::bind`]). The stock templates show the expected shape:
//!
//! - `#metadata` scopes the page metadata (`.title`, `.date`, `.author`,
//!   `.breadcrumb`).
//! - The date element sits inside a `.date-block` wrapper, removed as a whole
//!   when a page has no date.
//! - Article templates must contain a `.content` placeholder.
//! - Directory templates stamp one `tr.ls` row per child page.
//! - `<title>` and `<meta name="keywords">` are filled from metadata.

use crate::dom::{self, DomError, Element};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Cannot read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid template {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: DomError,
    },
}

const STOCK_ARTICLE: &str = include_str!("../static/article.html");
const STOCK_DIRECTORY: &str = include_str!("../static/directory.html");

pub const ARTICLE_TEMPLATE: &str = "article.html";
pub const DIRECTORY_TEMPLATE: &str = "directory.html";

/// Parsed article and directory templates.
#[derive(Debug, Clone)]
pub struct Theme {
    pub article: Element,
    pub directory: Element,
}

impl Theme {
    /// Load `article.html` and `directory.html` from `dir`, or the stock theme
    /// when `dir` does not exist.
    pub fn load(dir: &Path) -> Result<Self, ThemeError> {
        if !dir.is_dir() {
            tracing::debug!(theme = %dir.display(), "theme directory missing, using stock theme");
            return Self::stock();
        }
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(|source| ThemeError::Io { path, source })
        };
        Self::from_sources(&read(ARTICLE_TEMPLATE)?, &read(DIRECTORY_TEMPLATE)?)
    }

    /// The theme embedded in the binary.
    pub fn stock() -> Result<Self, ThemeError> {
        Self::from_sources(STOCK_ARTICLE, STOCK_DIRECTORY)
    }

    pub fn from_sources(article: &str, directory: &str) -> Result<Self, ThemeError> {
        Ok(Self {
            article: parse(ARTICLE_TEMPLATE, article)?,
            directory: parse(DIRECTORY_TEMPLATE, directory)?,
        })
    }
}

fn parse(name: &str, markup: &str) -> Result<Element, ThemeError> {
    dom::parse_fragment(markup).map_err(|source| ThemeError::Template {
        name: name.to_string(),
        source,
    })
}
