//! Owned HTML element tree used as the binding target.
//!
//! Theme templates are parsed once into an [`Element`] tree and cloned for
//! every page, so binding one page can never leak into another. The tree is
//! deliberately small: elements, escaped text, and raw markup. Raw nodes hold
//! content that must be emitted verbatim (rendered markdown bodies, entity
//! references the XML reader does not know, comments, the doctype).
//!
//! ## Parsing
//!
//! Templates are read with quick-xml's event reader, so they must be
//! well-formed XHTML with one exception: HTML void elements (`<meta>`,
//! `<link>`, `<br>`, ...) may be left unclosed.
//!
//! ## Addressing
//!
//! Nodes are addressed by *paths*: the sequence of child indices leading from
//! an element down to a descendant. Comparing two paths lexicographically
//! gives their document order, which the breadcrumb rule relies on.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomError {
    #[error("XML parse error at position {position}: {source}")]
    Parse {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Unexpected closing tag </{found}> (open element: <{expected}>)")]
    UnexpectedEnd { expected: String, found: String },
}

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text content is emitted without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Index path from an element to one of its descendants.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Unescaped text; escaped on output.
    Text(String),
    /// Markup emitted verbatim.
    Raw(String),
}

/// An HTML element with ordered attributes.
///
/// The fragment root returned by [`parse_fragment`] is an element with an
/// empty name; only its children are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children = vec![Node::Text(text.to_string())];
    }

    /// Replace all children with verbatim markup.
    pub fn set_inner_raw(&mut self, markup: &str) {
        self.children = if markup.is_empty() {
            Vec::new()
        } else {
            vec![Node::Raw(markup.to_string())]
        };
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Concatenated text content of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    // ------------------------------------------------------------------
    // Path navigation
    // ------------------------------------------------------------------

    pub fn get(&self, path: &[usize]) -> Option<&Element> {
        path.iter().try_fold(self, |el, &i| match el.children.get(i) {
            Some(Node::Element(child)) => Some(child),
            _ => None,
        })
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut el = self;
        for &i in path {
            el = match el.children.get_mut(i) {
                Some(Node::Element(child)) => child,
                _ => return None,
            };
        }
        Some(el)
    }

    /// Path of the first descendant (document order) matching `pred`.
    /// The element itself is never considered.
    pub fn find(&self, pred: impl Fn(&Element) -> bool) -> Option<NodePath> {
        let mut path = Vec::new();
        find_first(self, &pred, &mut path).then_some(path)
    }

    pub fn find_mut(&mut self, pred: impl Fn(&Element) -> bool) -> Option<&mut Element> {
        let path = self.find(pred)?;
        self.get_mut(&path)
    }

    /// Paths of every descendant matching `pred`, in document order.
    pub fn find_all(&self, pred: impl Fn(&Element) -> bool) -> Vec<NodePath> {
        let mut found = Vec::new();
        collect_matches(self, &pred, &mut Vec::new(), &mut found);
        found
    }

    /// Detach the node at `path`. The element itself (empty path) cannot be removed.
    pub fn remove(&mut self, path: &[usize]) -> Option<Node> {
        let (&index, parent_path) = path.split_last()?;
        let parent = self.get_mut(parent_path)?;
        (index < parent.children.len()).then(|| parent.children.remove(index))
    }

    /// Detach several nodes. Later paths are removed first so earlier ones
    /// stay valid; duplicates are ignored.
    pub fn remove_all(&mut self, mut paths: Vec<NodePath>) {
        paths.sort_unstable_by(|a, b| b.cmp(a));
        paths.dedup();
        for path in paths {
            self.remove(&path);
        }
    }

    /// Swap the node at `path` for `replacement`.
    pub fn replace(&mut self, path: &[usize], replacement: Element) -> bool {
        let Some((&index, parent_path)) = path.split_last() else {
            return false;
        };
        match self
            .get_mut(parent_path)
            .and_then(|parent| parent.children.get_mut(index))
        {
            Some(slot) => {
                *slot = Node::Element(replacement);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let raw_text = RAW_TEXT_ELEMENTS.contains(&self.name.as_str());
        for child in &self.children {
            write_node(child, raw_text, &mut out);
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
            Node::Raw(_) => {}
        }
    }
}

fn find_first(el: &Element, pred: &impl Fn(&Element) -> bool, path: &mut NodePath) -> bool {
    for (i, child) in el.children.iter().enumerate() {
        if let Node::Element(child) = child {
            path.push(i);
            if pred(child) || find_first(child, pred, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

fn collect_matches(
    el: &Element,
    pred: &impl Fn(&Element) -> bool,
    path: &mut NodePath,
    found: &mut Vec<NodePath>,
) {
    for (i, child) in el.children.iter().enumerate() {
        if let Node::Element(child) = child {
            path.push(i);
            if pred(child) {
                found.push(path.clone());
            }
            collect_matches(child, pred, path, found);
            path.pop();
        }
    }
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(el) => write_element(el, out),
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
        Node::Raw(markup) => out.push_str(markup),
    }
}

fn write_element(el: &Element, out: &mut String) {
    if el.name.is_empty() {
        out.push_str(&el.inner_html());
        return;
    }
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    if el.is_void() {
        return;
    }
    out.push_str(&el.inner_html());
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

/// Escape an attribute value. Named references kept verbatim by the parser
/// (`&nbsp;`) are written back as they were.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.char_indices() {
        match c {
            '&' if is_kept_reference(&value[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Whether `rest`, the text after an `&`, starts with a named reference the
/// parser could not decode.
fn is_kept_reference(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let name = &rest[..end];
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
        && decode_entity(name).is_none()
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a template into a fragment root whose children are the template's
/// top-level nodes.
pub fn parse_fragment(markup: &str) -> Result<Element, DomError> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);
    // Void elements arrive as unmatched start tags; nesting is checked below.
    reader.config_mut().check_end_names = false;

    let mut stack = vec![Element::default()];

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(source) => {
                return Err(DomError::Parse {
                    position: reader.error_position(),
                    source,
                });
            }
        };
        match event {
            Event::Start(e) => {
                let el = element_from(&e);
                if el.is_void() {
                    push_node(&mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Event::Empty(e) => push_node(&mut stack, Node::Element(element_from(&e))),
            Event::End(e) => {
                let name = lossy(e.name().as_ref());
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                if stack.len() < 2 {
                    return Err(DomError::UnexpectedEnd {
                        expected: String::new(),
                        found: name,
                    });
                }
                let Some(open) = stack.pop() else { break };
                if open.name != name {
                    return Err(DomError::UnexpectedEnd {
                        expected: open.name,
                        found: name,
                    });
                }
                push_node(&mut stack, Node::Element(open));
            }
            Event::Text(e) => push_text(&mut stack, &lossy(&e)),
            Event::CData(e) => push_text(&mut stack, &lossy(&e)),
            Event::GeneralRef(e) => {
                let entity = lossy(&e);
                match decode_entity(&entity) {
                    Some(text) => push_text(&mut stack, &text),
                    None => push_node(&mut stack, Node::Raw(format!("&{entity};"))),
                }
            }
            Event::Comment(e) => push_node(&mut stack, Node::Raw(format!("<!--{}-->", lossy(&e)))),
            Event::DocType(e) => push_node(
                &mut stack,
                Node::Raw(format!("<!DOCTYPE {}>", lossy(&e).trim())),
            ),
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    // Unclosed elements are closed at end of input.
    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            push_node(&mut stack, Node::Element(open));
        }
    }
    Ok(stack.pop().unwrap_or_default())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from(start: &BytesStart<'_>) -> Element {
    let attrs = start
        .html_attributes()
        .flatten()
        .map(|attr| (lossy(attr.key.as_ref()), decode_attr(&lossy(&attr.value))))
        .collect();
    Element {
        name: lossy(start.name().as_ref()),
        attrs,
        children: Vec::new(),
    }
}

/// Decode character references in a raw attribute value, keeping the ones
/// [`decode_entity`] does not know as written.
fn decode_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .find(';')
            .and_then(|end| decode_entity(&rest[1..=end]).map(|text| (text, end + 2)));
        match decoded {
            Some((text, len)) => {
                out.push_str(&text);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

/// Append text, merging with a preceding text node.
fn push_text(stack: &mut [Element], text: &str) {
    let Some(top) = stack.last_mut() else { return };
    match top.children.last_mut() {
        Some(Node::Text(existing)) => existing.push_str(text),
        _ => top.children.push(Node::Text(text.to_string())),
    }
}

/// Decode the XML predefined entities and numeric character references.
fn decode_entity(entity: &str) -> Option<String> {
    let decoded = match entity {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "apos" => '\'',
        "quot" => '"',
        s if s.starts_with("#x") || s.starts_with("#X") => {
            char::from_u32(u32::from_str_radix(&s[2..], 16).ok()?)?
        }
        s if s.starts_with('#') => char::from_u32(s[1..].parse().ok()?)?,
        _ => return None,
    };
    Some(decoded.to_string())
}
