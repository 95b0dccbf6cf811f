//! # docweld
//!
//! A static documentation generator. Your filesystem is the data source:
//! every directory under the source root becomes one page, directories holding
//! a markdown file become articles, and every other directory lists its
//! children.
//!
//! # Architecture: Weld, Don't Template
//!
//! Themes are plain HTML files with *placeholders*: elements marked by a
//! class, id, or `name` attribute. There is no template language. Each page
//! is turned into a JSON binding context, and the [`bind`] engine walks that
//! context over a clone of the theme, filling the placeholder for every key:
//!
//! ```text
//! { "metadata": { "title": "Streams" } }      <header id="metadata">
//!                  │                             <h1 class="title">Streams</h1>
//!                  └─ key "title" ───────────→ </header>
//! ```
//!
//! Objects scope their keys to the matched element, arrays stamp one clone of
//! it per item, and leaves go through a small fixed set of rules (breadcrumb,
//! listing row, date, GitHub link, raw markup).
//!
//! # Pipeline
//!
//! ```text
//! 1. Load     pages/, authors/, theme/, config.toml  (per page for pages/)
//! 2. TOC      one table of contents for the whole site
//! 3. Render   each page in parallel: bind, prune, head, highlight
//! 4. Write    <output>/<page>/index.html, failures collected per page
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Runs a build or check over a [`pipeline::Site`], returns a [`pipeline::BuildReport`] |
//! | [`load`] | Walks the source tree into [`types::Pages`]; loads the author registry |
//! | [`theme`] | Article and directory templates, with a stock theme compiled in |
//! | [`bind`] | Binding engine: placeholder matching, list stamping, leaf rules |
//! | [`render`] | Per-page rendering: template selection, context, pruning, head tags |
//! | [`highlight`] | Code highlighting with syntect and the `&gt;` repair pass |
//! | [`toc`] | Site-wide table of contents, rendered with Maud |
//! | [`write`] | Page path → output path mapping and file writes |
//! | [`dom`] | Owned HTML element tree the binder works on |
//! | [`config`] | `config.toml` loading, validation, and merging over stock defaults |
//! | [`types`] | Page, metadata, and author records |
//! | [`output`] | CLI output formatting of build reports |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Owned Tree Over a Browser DOM
//!
//! Templates are parsed once with quick-xml into a small owned tree
//! ([`dom::Element`]) and cloned per page. Binding is plain tree surgery by
//! index path, so pages can be rendered on any thread with no shared mutable
//! state. The cost is that themes must be well-formed XHTML (void elements
//! such as `<meta>` may stay unclosed).
//!
//! ## Tracked Writes
//!
//! Every write is checked and its result recorded. A page that fails to render
//! or write is reported by path and stage, the rest of the site is still
//! generated, and the CLI exits non-zero.

pub mod bind;
pub mod config;
pub mod dom;
pub mod highlight;
pub mod load;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod theme;
pub mod toc;
pub mod types;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
