//! Build pipeline.
//!
//! Ties the stages together for one run:
//!
//! ```text
//! config.toml ─┐
//! pages/ ──────┼─ load ─→ toc ─→ render (parallel) ─→ write ─→ BuildReport
//! authors/ ────┤
//! theme/ ──────┘
//! ```
//!
//! A bad config, author record or template, or an unreadable source root,
//! aborts the run with a [`BuildError`]. Everything else is per page: a page
//! whose files cannot be loaded, rendered or written is logged, recorded in
//! the [`BuildReport`], and the remaining pages carry on.
//!
//! Pages are rendered on the global rayon pool; each worker owns one page
//! and the renderer is shared read-only.

use crate::config::{self, ConfigError, SiteConfig};
use crate::load::{LoadError, load_authors, load_pages};
use crate::render::{PageRenderer, RenderError};
use crate::theme::{Theme, ThemeError};
use crate::toc::build_toc;
use crate::types::Page;
use crate::write::{WriteError, destination, write_page};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Theme error: {0}")]
    Theme(#[from] ThemeError),
}

/// Why a single page failed.
#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl PageError {
    pub fn stage(&self) -> &'static str {
        match self {
            PageError::Load(_) => "load",
            PageError::Render(_) => "render",
            PageError::Write(_) => "write",
        }
    }
}

#[derive(Debug)]
pub struct PageFailure {
    pub page: PathBuf,
    pub error: PageError,
}

/// Outcome of a run. All lists are sorted by path.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Pages that rendered successfully.
    pub rendered: Vec<PathBuf>,
    /// Files written (empty for a check run).
    pub written: Vec<PathBuf>,
    pub failed: Vec<PageFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolved site layout: every directory the run reads or writes.
#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
    pub source: PathBuf,
    pub output: PathBuf,
    pub theme: PathBuf,
    pub authors: PathBuf,
    pub config: SiteConfig,
}

impl Site {
    /// Load `config.toml` from `root` and resolve the site directories.
    pub fn load(root: &Path) -> Result<Self, BuildError> {
        let config = config::load_config(root)?;
        Ok(Self::from_config(root, config))
    }

    /// Resolve directories from `config`, relative to `root`.
    pub fn from_config(root: &Path, config: SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            source: root.join(&config.source),
            output: root.join(&config.output),
            theme: root.join(&config.theme),
            authors: root.join(&config.authors),
            config,
        }
    }
}

/// Render every page of `site`, writing the results when `write` is set.
pub fn build(site: &Site, write: bool) -> Result<BuildReport, BuildError> {
    tracing::info!(source = %site.source.display(), "loading pages");
    let tree = load_pages(&site.source)?;
    let mut pages = tree.pages;
    let authors = load_authors(&site.authors)?;
    let theme = Theme::load(&site.theme)?;
    let toc = build_toc(&site.source, &pages);
    tracing::info!(pages = pages.len(), authors = authors.len(), "loaded site");

    let renderer = PageRenderer::new(theme, authors, toc, &site.config, &site.source);

    let outcomes: Vec<(PathBuf, Result<Option<PathBuf>, PageError>)> = pages
        .par_iter_mut()
        .map(|(id, page)| {
            let outcome = render_page(site, &renderer, id, page, write);
            (id.clone(), outcome)
        })
        .collect();

    let mut report = BuildReport::default();
    report.failed.extend(tree.failed.into_iter().map(|(page, error)| PageFailure {
        page,
        error: error.into(),
    }));
    for (page, outcome) in outcomes {
        match outcome {
            Ok(dest) => {
                tracing::debug!(page = %page.display(), "rendered");
                report.written.extend(dest);
                report.rendered.push(page);
            }
            Err(error) => {
                tracing::warn!(
                    page = %page.display(),
                    stage = error.stage(),
                    %error,
                    "page failed"
                );
                report.failed.push(PageFailure { page, error });
            }
        }
    }
    report.rendered.sort();
    report.written.sort();
    report.failed.sort_by(|a, b| a.page.cmp(&b.page));

    tracing::info!(
        rendered = report.rendered.len(),
        written = report.written.len(),
        failed = report.failed.len(),
        "build finished"
    );
    Ok(report)
}

/// Render one page in place and, when writing, persist it.
fn render_page(
    site: &Site,
    renderer: &PageRenderer,
    id: &Path,
    page: &mut Page,
    write: bool,
) -> Result<Option<PathBuf>, PageError> {
    let html = renderer.render(id, page)?;
    let dest = if write {
        let dest = destination(&site.source, &site.output, id)?;
        write_page(&dest, &html)?;
        Some(dest)
    } else {
        None
    };
    page.content = Some(html);
    Ok(dest)
}
