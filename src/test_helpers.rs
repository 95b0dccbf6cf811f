//! Shared test utilities for the docweld test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let site = Site::load(tmp.path()).unwrap();
//! build(&site, true).unwrap();
//!
//! let html = read_output(&site, "articles/streams");
//! assert!(html.contains("<title>node docs :: Streams</title>"));
//! ```

use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::pipeline::Site;
use crate::types::{Page, Pages};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Lookups (panic with a clear message on miss)
// =========================================================================

/// Find a page by its path relative to the source root (`""` for the root).
pub fn find_page<'a>(pages: &'a Pages, src: &Path, rel: &str) -> &'a Page {
    let key = if rel.is_empty() {
        src.to_path_buf()
    } else {
        src.join(rel)
    };
    pages.get(&key).unwrap_or_else(|| {
        let keys: Vec<_> = pages.keys().map(|k| k.display().to_string()).collect();
        panic!("page '{rel}' not found. Available: {keys:?}")
    })
}

/// Read the generated `index.html` for a page (`""` for the root).
pub fn read_output(site: &Site, rel: &str) -> String {
    let path = site.output.join(rel).join("index.html");
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

/// Every file under the output directory, relative and `/`-separated, sorted.
pub fn output_files(site: &Site) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(&site.output)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(&site.output)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
