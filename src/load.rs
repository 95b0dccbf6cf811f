//! Source tree loading.
//!
//! Every directory under the source root (the root included) is one page:
//!
//! ```text
//! pages/                      → directory page, lists its children
//! ├── metadata.json           → optional directory metadata
//! ├── guides/
//! │   ├── intro/
//! │   │   ├── intro.md        → article body
//! │   │   └── intro.json      → article metadata
//! │   └── streams/
//! │       ├── index.markdown
//! │       └── metadata.json   → fallback metadata file name
//! └── .drafts/                → hidden, skipped
//! ```
//!
//! A directory holding a markdown file is an article and gets no listing.
//! Listing entries are written as `<source dir name>/<relative path>` with `/`
//! separators (`pages/guides/intro`); the binder strips that prefix again when
//! building links.
//!
//! Only a missing or unwalkable source root fails the whole load. A directory
//! whose files cannot be read, or whose metadata is not valid JSON, is kept
//! out of [`SourceTree::pages`] and reported in [`SourceTree::failed`].
//! Markdown is decoded lossily, so stray non-UTF-8 bytes never fail a page.

use crate::types::{AuthorRecord, AuthorRegistry, Metadata, Page, Pages};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Source root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("Invalid metadata in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid author record in {path}: {source}")]
    Author {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown"];
const DIRECTORY_METADATA: &str = "metadata.json";

/// Result of walking the source tree.
#[derive(Debug, Default)]
pub struct SourceTree {
    pub pages: Pages,
    /// Directories that could not be loaded, in walk order.
    pub failed: Vec<(PathBuf, LoadError)>,
}

/// Load every page under `src`, keyed by directory path.
pub fn load_pages(src: &Path) -> Result<SourceTree, LoadError> {
    if !src.is_dir() {
        return Err(LoadError::NotADirectory(src.to_path_buf()));
    }
    let label = source_label(src);
    let mut tree = SourceTree::default();

    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
    for entry in walker {
        let entry = entry.map_err(|source| LoadError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.into_path();
        match load_page(src, &dir, &label) {
            Ok(page) => {
                let article = page.content.is_some();
                tracing::trace!(page = %dir.display(), article, "loaded");
                tree.pages.insert(dir, page);
            }
            Err(error) => {
                tracing::warn!(page = %dir.display(), %error, "cannot load page");
                tree.failed.push((dir, error));
            }
        }
    }
    Ok(tree)
}

/// Name listing entries are prefixed with: the source directory's own name.
pub fn source_label(src: &Path) -> String {
    let resolved = fs::canonicalize(src).unwrap_or_else(|_| src.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// Page path relative to the source root, `/`-separated; `.` for the root.
pub fn relative_page_path(src: &Path, page: &Path) -> String {
    let rel = page.strip_prefix(src).unwrap_or(page);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn load_page(src: &Path, dir: &Path, label: &str) -> Result<Page, LoadError> {
    let mut files = Vec::new();
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            children.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }
    files.sort();
    children.sort();

    let content_file = files.iter().find(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CONTENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    });

    let Some(content_file) = content_file else {
        let metadata_path = dir.join(DIRECTORY_METADATA);
        let listing = children
            .iter()
            .map(|child| format!("{label}/{}", relative_page_path(src, child)))
            .collect();
        return Ok(Page {
            content: None,
            metadata: read_metadata(&metadata_path)?,
            listing: Some(listing),
        });
    };

    let content = String::from_utf8_lossy(&fs::read(content_file)?).into_owned();
    let sidecar = content_file.with_extension("json");
    let metadata = match read_metadata(&sidecar)? {
        Some(meta) => Some(meta),
        None => read_metadata(&dir.join(DIRECTORY_METADATA))?,
    };
    Ok(Page {
        content: Some(content),
        metadata,
        listing: None,
    })
}

fn read_metadata(path: &Path) -> Result<Option<Metadata>, LoadError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| LoadError::Metadata {
            path: path.to_path_buf(),
            source,
        })
}

/// Load `<id>.json` author records from `dir`. A missing directory yields an
/// empty registry.
pub fn load_authors(dir: &Path) -> Result<AuthorRegistry, LoadError> {
    let mut authors = AuthorRegistry::new();
    if !dir.is_dir() {
        return Ok(authors);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let text = fs::read_to_string(&path)?;
        let record: AuthorRecord =
            serde_json::from_str(&text).map_err(|source| LoadError::Author {
                path: path.clone(),
                source,
            })?;
        authors.insert(id, record);
    }
    Ok(authors)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
