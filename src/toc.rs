//! Site-wide table of contents.
//!
//! Built once per run from the loaded page set and bound into every page
//! through the `toc` placeholder. The tree mirrors the source directories,
//! excluding the root:
//!
//! ```html
//! <ul class="toc-tree">
//!   <li><a href="guides/">Guides</a>
//!     <ul><li><a href="guides/intro/">Intro</a></li></ul>
//!   </li>
//! </ul>
//! ```
//!
//! Links are relative to the site root; the stock theme sets `<base href="/">`.

use crate::load::relative_page_path;
use crate::types::Pages;
use maud::{Markup, html};
use std::path::Path;

struct TocNode {
    href: String,
    title: String,
    children: Vec<TocNode>,
}

/// Render the table of contents for `pages`. Empty when there is nothing
/// below the root.
pub fn build_toc(src: &Path, pages: &Pages) -> String {
    let labelled: Vec<(String, String)> = pages
        .iter()
        .filter_map(|(path, page)| {
            let rel = relative_page_path(src, path);
            if rel == "." {
                return None;
            }
            let name = rel.rsplit('/').next().unwrap_or(&rel).to_string();
            let title = page
                .metadata
                .as_ref()
                .and_then(|m| m.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or(name);
            Some((rel, title))
        })
        .collect();

    let entries: Vec<(Vec<&str>, &str, &str)> = labelled
        .iter()
        .map(|(rel, title)| (rel.split('/').collect(), rel.as_str(), title.as_str()))
        .collect();

    let roots = children_of(&entries, &[]);
    if roots.is_empty() {
        return String::new();
    }
    render_tree(&roots, true).into_string()
}

fn children_of(entries: &[(Vec<&str>, &str, &str)], parent: &[&str]) -> Vec<TocNode> {
    entries
        .iter()
        .filter(|(segments, _, _)| {
            segments.len() == parent.len() + 1 && segments.starts_with(parent)
        })
        .map(|(segments, rel, title)| TocNode {
            href: format!("{rel}/"),
            title: title.to_string(),
            children: children_of(entries, segments),
        })
        .collect()
}

fn render_tree(nodes: &[TocNode], top: bool) -> Markup {
    html! {
        ul class=[top.then_some("toc-tree")] {
            @for node in nodes {
                li {
                    a href=(node.href) { (node.title) }
                    @if !node.children.is_empty() {
                        (render_tree(&node.children, false))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, Page};
    use std::path::PathBuf;

    fn page(title: Option<&str>) -> Page {
        Page {
            metadata: title.map(|t| Metadata {
                title: Some(t.to_string()),
                ..Metadata::default()
            }),
            ..Page::default()
        }
    }

    fn pages(entries: &[(&str, Option<&str>)]) -> Pages {
        let src = PathBuf::from("/site/pages");
        entries
            .iter()
            .map(|(rel, title)| {
                let path = if rel.is_empty() { src.clone() } else { src.join(rel) };
                (path, page(*title))
            })
            .collect()
    }

    #[test]
    fn root_only_site_has_empty_toc() {
        let src = Path::new("/site/pages");
        assert_eq!(build_toc(src, &pages(&[("", Some("Docs"))])), "");
    }

    #[test]
    fn nested_pages_become_nested_lists() {
        let src = Path::new("/site/pages");
        let toc = build_toc(
            src,
            &pages(&[
                ("", None),
                ("guides", Some("Guides")),
                ("guides/intro", Some("Intro")),
                ("api", None),
            ]),
        );
        assert_eq!(
            toc,
            concat!(
                r#"<ul class="toc-tree">"#,
                r#"<li><a href="api/">api</a></li>"#,
                r#"<li><a href="guides/">Guides</a><ul><li><a href="guides/intro/">Intro</a></li></ul></li>"#,
                "</ul>"
            )
        );
    }

    #[test]
    fn titles_are_escaped() {
        let src = Path::new("/site/pages");
        let toc = build_toc(src, &pages(&[("a", Some("<b>&"))]));
        assert!(toc.contains("&lt;b&gt;&amp;"));
    }
}
