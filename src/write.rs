//! Output writing.
//!
//! A page stored under `<source>/foo/bar` is written to
//! `<output>/foo/bar/index.html`; the source root itself becomes
//! `<output>/index.html`. Every write is checked and its outcome returned, so
//! the pipeline can report failed pages instead of dropping them.

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Page {page} is not inside source root {source_root}")]
    OutsideSource { page: PathBuf, source_root: PathBuf },
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub const INDEX_FILE: &str = "index.html";

/// Map a page path under `src` to its output file under `dest`.
///
/// `.` components are dropped; `..` or absolute remainders are rejected so
/// nothing is ever written outside `dest`.
pub fn destination(src: &Path, dest: &Path, page: &Path) -> Result<PathBuf, WriteError> {
    let outside = || WriteError::OutsideSource {
        page: page.to_path_buf(),
        source_root: src.to_path_buf(),
    };
    let rel = match page.strip_prefix(src) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let page_abs = std::path::absolute(page).map_err(|_| outside())?;
            let src_abs = std::path::absolute(src).map_err(|_| outside())?;
            page_abs
                .strip_prefix(&src_abs)
                .map_err(|_| outside())?
                .to_path_buf()
        }
    };

    let mut out = dest.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside());
            }
        }
    }
    out.push(INDEX_FILE);
    Ok(out)
}

/// Write `html` to `path`, creating parent directories.
pub fn write_page(path: &Path, html: &str) -> Result<(), WriteError> {
    let io = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }
    fs::write(path, html).map_err(io)
}
