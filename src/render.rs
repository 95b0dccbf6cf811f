//! Per-page rendering.
//!
//! [`PageRenderer`] turns one loaded [`Page`] into a complete HTML document:
//!
//! 1. **Template selection**: pages with a markdown body and metadata use the
//!    article template, everything else the directory template. The template
//!    is cloned, never bound in place.
//! 2. **Context**: article pages bind `{metadata, content, toc}`, directory
//!    pages `{pwd, ls, toc, metadata}`. Author ids are resolved through the
//!    registry first.
//! 3. **Bind** through [`Binder`].
//! 4. **Prune** metadata placeholders the page has no value for.
//! 5. **Head**: `<title>` and `<meta name="keywords">`.
//! 6. **Highlight** code blocks, then [`repair`] the known `&gt;` defect.
//!
//! The renderer holds only immutable state and is shared across worker
//! threads.

use crate::bind::{Binder, BindingError, find_placeholder};
use crate::config::{HighlightConfig, SiteConfig};
use crate::dom::{Element, NodePath};
use crate::highlight::{ConversionError, Highlighter, SyntectHighlighter, repair};
use crate::load::{relative_page_path, source_label};
use crate::theme::Theme;
use crate::types::{AuthorRegistry, Metadata, Page};
use pulldown_cmark::{Options, Parser, html as md_html};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Binding failed: {0}")]
    Binding(#[from] BindingError),
    #[error("Highlighting failed: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Cannot build binding context: {0}")]
    Context(#[from] serde_json::Error),
}

/// Class of the wrapper removed together with a missing date.
const DATE_BLOCK: &str = "date-block";
/// Ancestor removed for a missing date when no wrapper is marked.
const DATE_BLOCK_DEPTH: usize = 3;

#[derive(Serialize)]
struct ArticleContext<'a> {
    metadata: &'a Metadata,
    content: &'a str,
    toc: &'a str,
}

#[derive(Serialize)]
struct DirectoryContext<'a> {
    pwd: &'a str,
    ls: &'a [String],
    toc: &'a str,
    metadata: &'a Metadata,
}

/// Convert markdown to HTML with the GitHub-flavoured extensions.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

pub struct PageRenderer {
    theme: Theme,
    authors: AuthorRegistry,
    toc: String,
    title: String,
    tags: Vec<String>,
    highlight: HighlightConfig,
    source: PathBuf,
    binder: Binder,
    highlighter: Option<Box<dyn Highlighter>>,
}

impl PageRenderer {
    /// Build a renderer for pages loaded from `source`. The syntect
    /// highlighter is set up only when highlighting is enabled.
    pub fn new(
        theme: Theme,
        authors: AuthorRegistry,
        toc: String,
        config: &SiteConfig,
        source: &Path,
    ) -> Self {
        let highlighter: Option<Box<dyn Highlighter>> = config
            .highlight
            .enabled
            .then(|| Box::new(SyntectHighlighter::new()) as Box<dyn Highlighter>);
        Self {
            theme,
            authors,
            toc,
            title: config.title.clone(),
            tags: config.tags.clone(),
            highlight: config.highlight.clone(),
            source: source.to_path_buf(),
            binder: Binder::new().with_listing_prefix(format!("{}/", source_label(source))),
            highlighter,
        }
    }

    /// Use a different highlighter.
    pub fn with_highlighter(mut self, highlighter: impl Highlighter + 'static) -> Self {
        self.highlighter = Some(Box::new(highlighter));
        self
    }

    /// Render the page stored under `id`.
    pub fn render(&self, id: &Path, page: &Page) -> Result<String, RenderError> {
        let metadata = page.metadata.clone().map(|mut meta| {
            meta.resolve_author(&self.authors);
            meta
        });

        let (mut dom, context) = match (&metadata, page.content.as_deref()) {
            (Some(meta), Some(markdown)) if page.is_article() => {
                let dom = self.theme.article.clone();
                if find_placeholder(&dom, "content").is_none() {
                    return Err(BindingError::MissingPlaceholder("content".to_string()).into());
                }
                let body = markdown_to_html(markdown);
                let context = serde_json::to_value(ArticleContext {
                    metadata: meta,
                    content: &body,
                    toc: &self.toc,
                })?;
                (dom, context)
            }
            _ => {
                let root = Metadata::root();
                let pwd = relative_page_path(&self.source, id);
                let context = serde_json::to_value(DirectoryContext {
                    pwd: &pwd,
                    ls: page.listing.as_deref().unwrap_or_default(),
                    toc: &self.toc,
                    metadata: metadata.as_ref().unwrap_or(&root),
                })?;
                (self.theme.directory.clone(), context)
            }
        };

        self.binder.bind(&mut dom, &context)?;
        if let Some(meta) = &metadata {
            prune_missing_metadata(&mut dom, meta);
        }
        inject_head(&mut dom, metadata.as_ref(), &self.title, &self.tags);

        let html = dom.inner_html();
        let html = match &self.highlighter {
            Some(highlighter) => highlighter.highlight(
                &html,
                self.highlight.auto_detect,
                self.highlight.preserve_entities,
            )?,
            None => html,
        };
        Ok(repair(&html))
    }
}

// ============================================================================
// Post-binding passes
// ============================================================================

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

/// Remove the title and date placeholders inside `#metadata` when the page
/// has no value for them.
fn prune_missing_metadata(dom: &mut Element, meta: &Metadata) {
    let Some(scope_path) = dom.find(|el| el.attr("id") == Some("metadata")) else {
        return;
    };
    let Some(scope) = dom.get(&scope_path) else {
        return;
    };
    let absolute = |rel: NodePath| -> NodePath { [scope_path.as_slice(), rel.as_slice()].concat() };

    let mut doomed = Vec::new();
    if is_blank(meta.title.as_deref()) {
        doomed.extend(scope.find_all(|el| el.has_class("title")).into_iter().map(absolute));
    }
    if !meta.has_date() {
        for date in scope.find_all(|el| el.has_class("date")) {
            doomed.extend(date_block(dom, &absolute(date)));
        }
    }
    dom.remove_all(doomed);
}

/// The nearest `.date-block` ancestor of `date`, else the ancestor three
/// levels up. `None` when the date sits too shallow for that ancestor to be
/// anything but a top-level element.
fn date_block(dom: &Element, date: &[usize]) -> Option<NodePath> {
    let marked = (1..date.len())
        .rev()
        .map(|len| &date[..len])
        .find(|path| dom.get(path).is_some_and(|el| el.has_class(DATE_BLOCK)));
    match marked {
        Some(path) => Some(path.to_vec()),
        None if date.len() > DATE_BLOCK_DEPTH => {
            Some(date[..date.len() - DATE_BLOCK_DEPTH].to_vec())
        }
        None => None,
    }
}

fn inject_head(
    dom: &mut Element,
    meta: Option<&Metadata>,
    site_title: &str,
    global_tags: &[String],
) {
    let page_title = meta.and_then(|m| m.title.as_deref()).filter(|t| !t.is_empty());
    if let Some(title) = page_title
        && let Some(el) = dom.find_mut(|el| el.name == "title")
    {
        el.set_text(&format!("{site_title} :: {title}"));
    }

    let page_tags = meta.map(|m| m.tags.as_slice()).unwrap_or_default();
    if let Some(el) =
        dom.find_mut(|el| el.name == "meta" && el.attr("name") == Some("keywords"))
    {
        el.set_attr("content", &keywords(page_tags, global_tags));
    }
}

/// Page tags then global tags, first occurrence kept, comma-joined.
fn keywords(page_tags: &[String], global_tags: &[String]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for tag in page_tags.iter().chain(global_tags) {
        if !seen.contains(&tag.as_str()) {
            seen.push(tag);
        }
    }
    seen.join(",")
}
