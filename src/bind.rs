//! Binding engine: welds a JSON context onto a template tree.
//!
//! The context is walked key by key. Each key is matched to a placeholder
//! element inside the current scope, and what happens next depends on the
//! value:
//!
//! | Value | Effect |
//! |-------|--------|
//! | object | the placeholder becomes the scope for the nested keys |
//! | array | the placeholder is a *stamp*, replaced by one clone per item |
//! | leaf | exactly one [`Rule`] populates the placeholder |
//!
//! ## Placeholder matching
//!
//! For key `k`, the placeholder is the first descendant of the scope carrying
//! class `k`, else the first with `id="k"`, else the first with `name="k"`.
//! Keys without a placeholder are skipped.
//!
//! ## Rules
//!
//! Leaf rules are selected by the placeholder's classes, first match wins:
//!
//! 1. `breadcrumb`: accumulates a path from the preceding crumbs in scope
//! 2. `ls`: turns a child path into a listing table row
//! 3. `date`: adds a machine-readable `datetime` attribute
//! 4. `github`: links the author's GitHub profile
//! 5. anything else: injects the value as raw markup
//!
//! Rules never descend into the placeholder's existing children; repeated
//! structure comes from list stamping, not recursion.

use crate::dom::{Element, Node, NodePath};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Binding context must be an object")]
    NotARecord,
    #[error("Template has no placeholder for '{0}'")]
    MissingPlaceholder(String),
    #[error("List '{0}' contains a nested list")]
    NestedList(String),
    #[error("Cannot parse date '{0}'")]
    InvalidDate(String),
}

/// Prefix stripped from listing paths to form link targets.
pub const DEFAULT_LISTING_PREFIX: &str = "pages/";

const GITHUB_URL: &str = "https://github.com/";
const GITHUB_LABEL: &str = "[github]";

/// Whether default handling should still run after a rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fall back to escaped text substitution.
    Continue,
    Stop,
}

/// One leaf binding: a placeholder inside its enclosing scope.
pub struct Binding<'a> {
    /// Enclosing scope: the record's element, or the stamp's parent for list items.
    pub scope: &'a mut Element,
    /// Placeholder path relative to `scope`.
    pub path: &'a [usize],
    pub key: &'a str,
    pub value: &'a Value,
}

/// Class-keyed binding rules, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Breadcrumb,
    Listing,
    Date,
    AuthorLink,
    RawInject,
}

impl Rule {
    const CLASSED: [(&'static str, Rule); 4] = [
        ("breadcrumb", Rule::Breadcrumb),
        ("ls", Rule::Listing),
        ("date", Rule::Date),
        ("github", Rule::AuthorLink),
    ];

    /// First rule whose class the element carries, else [`Rule::RawInject`].
    pub fn select(element: &Element) -> Rule {
        Self::CLASSED
            .iter()
            .find(|(class, _)| element.has_class(class))
            .map_or(Rule::RawInject, |&(_, rule)| rule)
    }

    pub fn apply(self, binder: &Binder, binding: Binding<'_>) -> Result<Flow, BindingError> {
        match self {
            Rule::Breadcrumb => bind_breadcrumb(binding),
            Rule::Listing => bind_listing(&binder.listing_prefix, binding),
            Rule::Date => bind_date(binding),
            Rule::AuthorLink => bind_author_link(binding),
            Rule::RawInject => bind_raw(binding),
        }
    }
}

/// Walks a binding context over a template.
#[derive(Debug, Clone)]
pub struct Binder {
    listing_prefix: String,
}

impl Default for Binder {
    fn default() -> Self {
        Self {
            listing_prefix: DEFAULT_LISTING_PREFIX.to_string(),
        }
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.listing_prefix = prefix.into();
        self
    }

    /// Bind `context` (a JSON object) onto `template` in place.
    pub fn bind(&self, template: &mut Element, context: &Value) -> Result<(), BindingError> {
        let Value::Object(record) = context else {
            return Err(BindingError::NotARecord);
        };
        self.bind_record(template, record)
    }

    fn bind_record(
        &self,
        scope: &mut Element,
        record: &Map<String, Value>,
    ) -> Result<(), BindingError> {
        for (key, value) in record {
            let Some(path) = find_placeholder(scope, key) else {
                tracing::trace!(key = %key, "no placeholder");
                continue;
            };
            match value {
                Value::Object(nested) => {
                    if let Some(target) = scope.get_mut(&path) {
                        self.bind_record(target, nested)?;
                    }
                }
                Value::Array(items) => self.bind_list(scope, &path, key, items)?,
                leaf => self.bind_leaf(scope, &path, key, leaf)?,
            }
        }
        Ok(())
    }

    /// Replace the stamp at `path` with one bound clone per item.
    fn bind_list(
        &self,
        scope: &mut Element,
        path: &[usize],
        key: &str,
        items: &[Value],
    ) -> Result<(), BindingError> {
        let Some((&index, parent_path)) = path.split_last() else {
            return Ok(());
        };
        let Some(parent) = scope.get_mut(parent_path) else {
            return Ok(());
        };
        let stamp = match parent.children.remove(index) {
            Node::Element(stamp) => stamp,
            other => {
                parent.children.insert(index, other);
                return Ok(());
            }
        };
        for offset in 0..items.len() {
            parent
                .children
                .insert(index + offset, Node::Element(stamp.clone()));
        }
        for (offset, item) in items.iter().enumerate() {
            let slot = [index + offset];
            match item {
                Value::Array(_) => return Err(BindingError::NestedList(key.to_string())),
                Value::Object(record) => {
                    if let Some(clone) = parent.get_mut(&slot) {
                        self.bind_record(clone, record)?;
                    }
                }
                leaf => self.bind_leaf(parent, &slot, key, leaf)?,
            }
        }
        Ok(())
    }

    fn bind_leaf(
        &self,
        scope: &mut Element,
        path: &[usize],
        key: &str,
        value: &Value,
    ) -> Result<(), BindingError> {
        let Some(element) = scope.get(path) else {
            return Ok(());
        };
        let rule = Rule::select(element);
        let flow = rule.apply(
            self,
            Binding {
                scope: &mut *scope,
                path,
                key,
                value,
            },
        )?;
        if flow == Flow::Continue
            && let Some(element) = scope.get_mut(path)
        {
            element.set_text(&leaf_text(value));
        }
        Ok(())
    }
}

/// Locate the placeholder for `key` inside `scope`: class, then id, then name.
pub fn find_placeholder(scope: &Element, key: &str) -> Option<NodePath> {
    scope
        .find(|el| el.has_class(key))
        .or_else(|| scope.find(|el| el.attr("id") == Some(key)))
        .or_else(|| scope.find(|el| el.attr("name") == Some(key)))
}

/// Display form of a leaf value. Null renders as nothing.
fn leaf_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Rules
// ============================================================================

fn bind_breadcrumb(binding: Binding<'_>) -> Result<Flow, BindingError> {
    let value = leaf_text(binding.value);
    let mut crumb = String::new();
    for path in binding
        .scope
        .find_all(|el| el.has_class("breadcrumb"))
        .into_iter()
        .take_while(|p| p.as_slice() < binding.path)
    {
        if let Some(previous) = binding.scope.get(&path) {
            crumb.push('/');
            crumb.push_str(&previous.inner_html());
        }
    }
    crumb.push('/');
    crumb.push_str(&value);

    if let Some(element) = binding.scope.get_mut(binding.path) {
        element.set_attr("href", &crumb);
        element.set_inner_raw(&value);
    }
    Ok(Flow::Stop)
}

fn bind_listing(prefix: &str, binding: Binding<'_>) -> Result<Flow, BindingError> {
    let value = leaf_text(binding.value);
    let title = value
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let href = value.strip_prefix(prefix).unwrap_or(&value);

    let row = Element::new("tr").with_attr("class", "ls").with_child(
        Element::new("td").with_child(Element::new("a").with_attr("href", href).with_text(title)),
    );

    let Some(element) = binding.scope.get_mut(binding.path) else {
        return Ok(Flow::Stop);
    };
    if element.name == "tr" {
        binding.scope.replace(binding.path, row);
    } else if let Some(stamp_row) = element.find(|el| el.name == "tr") {
        element.replace(&stamp_row, row);
    } else {
        element.append(row);
    }
    Ok(Flow::Stop)
}

fn bind_date(binding: Binding<'_>) -> Result<Flow, BindingError> {
    let original = leaf_text(binding.value);
    if original.is_empty() {
        return Ok(Flow::Stop);
    }
    let parsed =
        parse_timestamp(binding.value).ok_or_else(|| BindingError::InvalidDate(original.clone()))?;
    if let Some(element) = binding.scope.get_mut(binding.path) {
        element.set_attr(
            "datetime",
            &parsed.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        element.set_text(&original);
    }
    Ok(Flow::Stop)
}

fn bind_author_link(binding: Binding<'_>) -> Result<Flow, BindingError> {
    let handle = leaf_text(binding.value);
    if handle.is_empty() {
        return Ok(Flow::Stop);
    }
    if let Some(element) = binding.scope.get_mut(binding.path) {
        element.append(
            Element::new("a")
                .with_attr("href", &format!("{GITHUB_URL}{handle}"))
                .with_text(GITHUB_LABEL),
        );
    }
    Ok(Flow::Stop)
}

fn bind_raw(binding: Binding<'_>) -> Result<Flow, BindingError> {
    if let Some(element) = binding.scope.get_mut(binding.path) {
        element.set_inner_raw(&leaf_text(binding.value));
    }
    Ok(Flow::Stop)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];

/// Parse a metadata timestamp. Numbers are epoch milliseconds; values without
/// an offset are taken as UTC.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = match value {
        Value::Number(n) => return DateTime::<Utc>::from_timestamp_millis(n.as_i64()?),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;
    use serde_json::json;

    fn bind(template: &str, context: Value) -> Element {
        let mut root = parse_fragment(template).unwrap();
        Binder::new().bind(&mut root, &context).unwrap();
        root
    }

    #[test]
    fn rule_priority_follows_class_order() {
        let el = Element::new("a").with_attr("class", "date breadcrumb");
        assert_eq!(Rule::select(&el), Rule::Breadcrumb);
        let el = Element::new("td").with_attr("class", "github date");
        assert_eq!(Rule::select(&el), Rule::Date);
        let el = Element::new("div").with_attr("class", "content");
        assert_eq!(Rule::select(&el), Rule::RawInject);
    }

    #[test]
    fn context_must_be_an_object() {
        let mut root = parse_fragment("<p></p>").unwrap();
        let err = Binder::new().bind(&mut root, &json!(["x"])).unwrap_err();
        assert!(matches!(err, BindingError::NotARecord));
    }

    #[test]
    fn default_rule_injects_raw_markup() {
        let root = bind(
            r#"<div class="content">placeholder</div>"#,
            json!({ "content": "<p>a &amp; <em>b</em></p>" }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<div class="content"><p>a &amp; <em>b</em></p></div>"#
        );
    }

    #[test]
    fn placeholders_match_by_id_and_name() {
        let root = bind(
            r#"<span id="pwd"></span><input name="q">"#,
            json!({ "pwd": "guides", "missing": "ignored" }),
        );
        assert_eq!(root.get(&[0]).unwrap().inner_html(), "guides");
    }

    #[test]
    fn class_match_wins_over_id() {
        let root = bind(
            r#"<p id="title">by id</p><h1 class="title">by class</h1>"#,
            json!({ "title": "T" }),
        );
        assert_eq!(root.get(&[0]).unwrap().inner_html(), "by id");
        assert_eq!(root.get(&[1]).unwrap().inner_html(), "T");
    }

    #[test]
    fn nested_records_scope_their_keys() {
        let root = bind(
            r#"<h1 class="title">outer</h1><div id="metadata"><h2 class="title">inner</h2></div>"#,
            json!({ "metadata": { "title": "Streams" } }),
        );
        assert_eq!(root.get(&[0]).unwrap().inner_html(), "outer");
        assert_eq!(root.get(&[1, 0]).unwrap().inner_html(), "Streams");
    }

    #[test]
    fn breadcrumbs_accumulate_preceding_crumbs() {
        let root = bind(
            r##"<nav id="metadata"><a class="breadcrumb" href="#">crumb</a></nav>"##,
            json!({ "metadata": { "breadcrumb": ["a", "b", "c"] } }),
        );
        let nav = root.get(&[0]).unwrap();
        let crumbs = nav.find_all(|el| el.has_class("breadcrumb"));
        assert_eq!(crumbs.len(), 3);
        let hrefs: Vec<&str> = crumbs
            .iter()
            .map(|p| nav.get(p).unwrap().attr("href").unwrap())
            .collect();
        assert_eq!(hrefs, vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(nav.get(&crumbs[2]).unwrap().inner_html(), "c");
    }

    #[test]
    fn breadcrumb_includes_static_crumbs_before_it() {
        let root = bind(
            r#"<nav><span class="breadcrumb">docs</span><a class="page breadcrumb">x</a></nav>"#,
            json!({ "page": "api" }),
        );
        let crumb = root.get(&[0, 1]).unwrap();
        assert_eq!(crumb.attr("href"), Some("/docs/api"));
    }

    #[test]
    fn listing_stamps_one_row_per_entry() {
        let root = bind(
            r##"<table><tbody><tr class="ls"><td><a href="#">file</a></td></tr></tbody></table>"##,
            json!({ "ls": ["pages/x.md", "pages/y/z.md"] }),
        );
        let rows = root.find_all(|el| el.name == "tr");
        assert_eq!(rows.len(), 2);
        let links: Vec<(String, String)> = root
            .find_all(|el| el.name == "a")
            .iter()
            .map(|p| {
                let a = root.get(p).unwrap();
                (a.attr("href").unwrap().to_string(), a.text())
            })
            .collect();
        assert_eq!(
            links,
            vec![
                ("x.md".to_string(), "x.md".to_string()),
                ("y/z.md".to_string(), "z.md".to_string()),
            ]
        );
    }

    #[test]
    fn listing_replaces_row_inside_non_row_stamp() {
        let root = bind(
            r#"<table class="ls"><tr><td>example</td></tr></table>"#,
            json!({ "ls": ["pages/a"] }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<table class="ls"><tr class="ls"><td><a href="a">a</a></td></tr></table>"#
        );
    }

    #[test]
    fn empty_listing_removes_the_stamp() {
        let root = bind(
            r#"<table><tr class="ls"><td></td></tr></table>"#,
            json!({ "ls": [] }),
        );
        assert_eq!(root.inner_html(), "<table></table>");
    }

    #[test]
    fn custom_listing_prefix_is_stripped() {
        let mut root = parse_fragment(r#"<table><tr class="ls"></tr></table>"#).unwrap();
        Binder::new()
            .with_listing_prefix("content/")
            .bind(&mut root, &json!({ "ls": ["content/guide"] }))
            .unwrap();
        let a = root.find(|el| el.name == "a").unwrap();
        assert_eq!(root.get(&a).unwrap().attr("href"), Some("guide"));
    }

    #[test]
    fn date_gets_iso_datetime_and_keeps_text() {
        let root = bind(
            r#"<time class="date"></time>"#,
            json!({ "date": "2011-04-12" }),
        );
        let time = root.get(&[0]).unwrap();
        assert_eq!(time.attr("datetime"), Some("2011-04-12T00:00:00.000Z"));
        assert_eq!(time.text(), "2011-04-12");
    }

    #[test]
    fn date_accepts_offsets_and_epoch_millis() {
        let root = bind(
            r#"<time class="date"></time>"#,
            json!({ "date": "2011-04-12T10:30:00+02:00" }),
        );
        assert_eq!(
            root.get(&[0]).unwrap().attr("datetime"),
            Some("2011-04-12T08:30:00.000Z")
        );

        let root = bind(r#"<time class="date"></time>"#, json!({ "date": 0 }));
        assert_eq!(
            root.get(&[0]).unwrap().attr("datetime"),
            Some("1970-01-01T00:00:00.000Z")
        );
    }

    #[test]
    fn null_date_leaves_element_untouched() {
        let root = bind(r#"<time class="date"></time>"#, json!({ "date": null }));
        assert_eq!(root.inner_html(), r#"<time class="date"></time>"#);
    }

    #[test]
    fn invalid_date_is_a_binding_error() {
        let mut root = parse_fragment(r#"<time class="date"></time>"#).unwrap();
        let err = Binder::new()
            .bind(&mut root, &json!({ "date": "someday" }))
            .unwrap_err();
        assert!(matches!(err, BindingError::InvalidDate(ref d) if d == "someday"));
    }

    #[test]
    fn github_handle_becomes_profile_link() {
        let root = bind(
            r#"<div class="author"><span class="name"></span><span class="github"></span></div>"#,
            json!({ "author": { "name": "Marak", "github": "marak" } }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<div class="author"><span class="name">Marak</span><span class="github"><a href="https://github.com/marak">[github]</a></span></div>"#
        );
    }

    #[test]
    fn missing_github_handle_leaves_element_empty() {
        let root = bind(
            r#"<div class="author"><span class="github"></span></div>"#,
            json!({ "author": { "name": "Marak", "github": null } }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<div class="author"><span class="github"></span></div>"#
        );
    }

    #[test]
    fn nested_lists_are_rejected() {
        let mut root = parse_fragment(r#"<ul><li class="tags"></li></ul>"#).unwrap();
        let err = Binder::new()
            .bind(&mut root, &json!({ "tags": [["a"]] }))
            .unwrap_err();
        assert!(matches!(err, BindingError::NestedList(_)));
    }

    #[test]
    fn list_of_records_binds_inside_each_clone() {
        let root = bind(
            r#"<ul><li class="people"><b class="name"></b></li></ul>"#,
            json!({ "people": [{ "name": "a" }, { "name": "b" }] }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<ul><li class="people"><b class="name">a</b></li><li class="people"><b class="name">b</b></li></ul>"#
        );
    }

    #[test]
    fn scalar_values_are_stringified() {
        let root = bind(
            r#"<i class="n"></i><i class="b"></i>"#,
            json!({ "n": 3, "b": true }),
        );
        assert_eq!(
            root.inner_html(),
            r#"<i class="n">3</i><i class="b">true</i>"#
        );
    }
}
