//! Code highlighting for rendered pages.
//!
//! Highlighting runs on the final serialized page and only touches `<code>`
//! elements. The language comes from a `language-*` class (as emitted by
//! pulldown-cmark for fenced blocks); with auto-detection enabled, untagged
//! blocks are matched by their first line (shebangs, modelines, `<?php`, ...).
//! Blocks that already contain markup, or whose language is unknown, are left
//! as they are.
//!
//! Whatever highlighter is used, its output goes through [`repair`]: some
//! highlighters tokenize an already-escaped `&gt;` as an identifier and emit
//! `&amp;<span class="identifier">gt</span>;`, which must be folded back.

use quick_xml::escape::unescape;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Syntax highlighting failed: {0}")]
    Syntect(#[from] syntect::Error),
}

/// The sequence produced when an escaped `>` is highlighted as an identifier.
pub const MISHIGHLIGHTED_GT: &str = "&amp;<span class=\"identifier\">gt</span>;";

/// Turns code blocks inside an HTML document into highlighted markup.
pub trait Highlighter: Send + Sync {
    /// Highlight every recognised code block in `html`.
    ///
    /// `auto_detect` enables language detection for blocks without a language
    /// class. `preserve_entities` treats block contents as already
    /// HTML-escaped, so entities are decoded before highlighting instead of
    /// being escaped a second time.
    fn highlight(
        &self,
        html: &str,
        auto_detect: bool,
        preserve_entities: bool,
    ) -> Result<String, ConversionError>;
}

/// Undo the known `&gt;` mis-highlighting. Always applied after highlighting.
pub fn repair(html: &str) -> String {
    html.replace(MISHIGHLIGHTED_GT, "&gt;")
}

static CODE_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<code([^>]*)>(.*?)</code>").expect("valid regex"));

static LANGUAGE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="[^"]*\blanguage-([A-Za-z0-9_+#-]+)"#).expect("valid regex")
});

/// Highlighter backed by syntect's bundled syntax definitions, emitting
/// CSS-classed spans (`<span class="source rust">`).
pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn syntax_for(&self, attrs: &str, code: &str, auto_detect: bool) -> Option<&SyntaxReference> {
        if let Some(caps) = LANGUAGE_CLASS.captures(attrs) {
            return self.syntaxes.find_syntax_by_token(&caps[1]);
        }
        if !auto_detect {
            return None;
        }
        code.lines()
            .next()
            .and_then(|line| self.syntaxes.find_syntax_by_first_line(line))
    }

    fn highlight_block(
        &self,
        syntax: &SyntaxReference,
        code: &str,
    ) -> Result<String, ConversionError> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(
        &self,
        html: &str,
        auto_detect: bool,
        preserve_entities: bool,
    ) -> Result<String, ConversionError> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;

        for caps in CODE_ELEMENT.captures_iter(html) {
            let (Some(whole), Some(attrs), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            out.push_str(&html[last..whole.start()]);
            last = whole.end();

            let code: Cow<'_, str> = if preserve_entities {
                unescape(body.as_str()).unwrap_or(Cow::Borrowed(body.as_str()))
            } else {
                Cow::Borrowed(body.as_str())
            };
            match self.syntax_for(attrs.as_str(), &code, auto_detect) {
                Some(syntax) if !body.as_str().contains('<') => {
                    let highlighted = self.highlight_block(syntax, &code)?;
                    out.push_str("<code");
                    out.push_str(attrs.as_str());
                    out.push('>');
                    out.push_str(&highlighted);
                    out.push_str("</code>");
                }
                _ => out.push_str(whole.as_str()),
            }
        }
        out.push_str(&html[last..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_replaces_every_mishighlighted_gt() {
        let html = format!("<code>a {MISHIGHLIGHTED_GT} b {MISHIGHLIGHTED_GT}</code>");
        let fixed = repair(&html);
        assert_eq!(fixed, "<code>a &gt; b &gt;</code>");
        assert!(!fixed.contains(MISHIGHLIGHTED_GT));
    }

    #[test]
    fn repair_leaves_clean_html_alone() {
        let html = "<p>1 &gt; 0</p>";
        assert_eq!(repair(html), html);
    }

    #[test]
    fn tagged_block_is_highlighted() {
        let html = r#"<pre><code class="language-rust">fn main() {}
</code></pre>"#;
        let out = SyntectHighlighter::new().highlight(html, false, true).unwrap();
        assert!(out.starts_with(r#"<pre><code class="language-rust"><span class=""#));
        assert!(out.contains("main"));
        assert!(out.ends_with("</code></pre>"));
    }

    #[test]
    fn escaped_entities_are_not_escaped_twice() {
        let html = r#"<code class="language-rust">if a &gt; b {}
</code>"#;
        let out = SyntectHighlighter::new().highlight(html, false, true).unwrap();
        assert!(out.contains("&gt;"));
        assert!(!out.contains("&amp;gt;"));
    }

    #[test]
    fn untagged_block_untouched_without_auto_detect() {
        let html = "<p>see <code>#!/bin/sh\necho hi\n</code></p>";
        let out = SyntectHighlighter::new().highlight(html, false, true).unwrap();
        assert_eq!(out, html);
    }

    #[test]
    fn auto_detect_uses_first_line() {
        let html = "<pre><code>#!/bin/bash\necho hi\n</code></pre>";
        let out = SyntectHighlighter::new().highlight(html, true, true).unwrap();
        assert!(out.contains("<span class="));
    }

    #[test]
    fn unknown_language_is_left_alone() {
        let html = r#"<code class="language-nonexistent-lang">x</code>"#;
        let out = SyntectHighlighter::new().highlight(html, true, true).unwrap();
        assert_eq!(out, html);
    }

    #[test]
    fn text_outside_code_is_preserved() {
        let html = r#"<h1>Title</h1><pre><code class="language-js">var a = 1;
</code></pre><p>after</p>"#;
        let out = SyntectHighlighter::new().highlight(html, false, true).unwrap();
        assert!(out.starts_with("<h1>Title</h1><pre><code"));
        assert!(out.ends_with("</code></pre><p>after</p>"));
    }
}
