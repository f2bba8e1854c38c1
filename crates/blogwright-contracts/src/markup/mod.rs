//! Minimal markup tree for generated blog documents.
//!
//! Only the shapes the section analyzer and the document mutator need are modelled:
//! elements (headings are classified by name), void elements and text. Wrapper elements
//! (`html`, `body`) are unwrapped on parse, so a [`Document`] is always the body content.
//! A body that is nothing but one `<article>`, `<main>`, `<section>` or `<div>` is
//! addressed through that element's children (see [`Document::content`]).

mod entities;
mod parser;
mod render;

use std::fmt;
use std::str::FromStr;

pub use parser::parse;

// A body made of exactly one of these is addressed through its children.
const CONTENT_WRAPPERS: &[&str] = &["article", "div", "main", "section"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn heading_level(&self) -> Option<u8> {
        heading_level_of(&self.name)
    }

    pub fn is_void(&self) -> bool {
        is_void_element(&self.name)
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Self::Element(element) => element.heading_level(),
            Self::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Whitespace-only text between elements.
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

impl Document {
    pub fn parse(html: &str) -> Self {
        parse(html)
    }

    /// The node list sections are cut from: the body, or the children of the wrapper
    /// element(s) the body consists of.
    pub fn content(&self) -> &[Node] {
        let mut nodes = self.nodes.as_slice();
        while let Some(idx) = lone_wrapper(nodes) {
            match &nodes[idx] {
                Node::Element(wrapper) => nodes = &wrapper.children,
                Node::Text(_) => break,
            }
        }
        nodes
    }

    /// Runs `edit` on the node list [`Document::content`] returns.
    pub fn edit_content<R>(&mut self, edit: impl FnOnce(&mut Vec<Node>) -> R) -> R {
        edit_content_nodes(&mut self.nodes, edit)
    }

    /// Headings of [`Document::content`] inside `scope`, as `(node index, level)`.
    pub fn headings(&self, scope: HeadingScope) -> Vec<(usize, u8)> {
        self.content()
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| {
                node.heading_level()
                    .filter(|level| scope.contains(*level))
                    .map(|level| (idx, level))
            })
            .collect()
    }

    pub fn to_html(&self) -> String {
        render::render_nodes(&self.nodes)
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            for child in &element.children {
                collect_text(child, out);
            }
        }
    }
}

/// Index of the only non-blank node when it is a content wrapper.
fn lone_wrapper(nodes: &[Node]) -> Option<usize> {
    let mut solid = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| !node.is_blank());
    let (idx, node) = solid.next()?;
    if solid.next().is_some() {
        return None;
    }
    match node {
        Node::Element(element) if CONTENT_WRAPPERS.contains(&element.name.as_str()) => Some(idx),
        _ => None,
    }
}

fn edit_content_nodes<R>(nodes: &mut Vec<Node>, edit: impl FnOnce(&mut Vec<Node>) -> R) -> R {
    if let Some(idx) = lone_wrapper(nodes) {
        if let Node::Element(wrapper) = &mut nodes[idx] {
            return edit_content_nodes(&mut wrapper.children, edit);
        }
    }
    edit(nodes)
}

pub(crate) fn heading_level_of(name: &str) -> Option<u8> {
    let digit = name.strip_prefix('h')?;
    match digit.parse::<u8>() {
        Ok(level @ 1..=6) if digit.len() == 1 => Some(level),
        _ => None,
    }
}

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Inclusive range of heading levels that delimit sections.
///
/// Shared by the section analyzer and the document mutator so both address the same
/// section list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingScope {
    min: u8,
    max: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeadingScopeError {
    #[error("heading levels must be written as `N` or `N-M`, got `{0}`")]
    Syntax(String),
    #[error("heading levels must be within 1-6 with min <= max, got {min}-{max}")]
    Range { min: u8, max: u8 },
}

impl HeadingScope {
    pub const ALL: Self = Self { min: 1, max: 6 };

    pub fn new(min: u8, max: u8) -> Result<Self, HeadingScopeError> {
        if min == 0 || max > 6 || min > max {
            return Err(HeadingScopeError::Range { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, level: u8) -> bool {
        (self.min..=self.max).contains(&level)
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }
}

impl Default for HeadingScope {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

impl FromStr for HeadingScope {
    type Err = HeadingScopeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let parse = |part: &str| {
            part.trim()
                .trim_start_matches(['h', 'H'])
                .parse::<u8>()
                .map_err(|_| HeadingScopeError::Syntax(trimmed.to_string()))
        };
        match trimmed.split_once('-') {
            Some((min, max)) => Self::new(parse(min)?, parse(max)?),
            None => {
                let level = parse(trimmed)?;
                Self::new(level, level)
            }
        }
    }
}

impl fmt::Display for HeadingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, HeadingScope, HeadingScopeError, Node};

    #[test]
    fn heading_scope_parses_ranges() {
        assert_eq!("1-6".parse::<HeadingScope>(), Ok(HeadingScope::ALL));
        assert_eq!("h1-h3".parse::<HeadingScope>(), Ok(HeadingScope::default()));
        assert_eq!(
            "2".parse::<HeadingScope>().map(|scope| (scope.min(), scope.max())),
            Ok((2, 2))
        );
        assert_eq!(
            "4-2".parse::<HeadingScope>(),
            Err(HeadingScopeError::Range { min: 4, max: 2 })
        );
        assert!(matches!(
            "one".parse::<HeadingScope>(),
            Err(HeadingScopeError::Syntax(_))
        ));
    }

    #[test]
    fn headings_respect_scope() {
        let doc = parse("<h1>A</h1><p>x</p><h4>deep</h4><h2>B</h2>");
        assert_eq!(doc.headings(HeadingScope::default()), vec![(0, 1), (3, 2)]);
        assert_eq!(
            doc.headings(HeadingScope::ALL),
            vec![(0, 1), (2, 4), (3, 2)]
        );
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let doc = parse("<p>Hello <strong>big</strong> world</p>");
        assert_eq!(doc.nodes[0].text_content(), "Hello big world");
    }

    #[test]
    fn lone_wrapper_is_addressed_through_its_children() {
        let doc = parse("<article>\n<main><h1>A</h1><p>x</p><h2>B</h2></main>\n</article>");
        assert_eq!(doc.content().len(), 3);
        assert_eq!(doc.headings(HeadingScope::default()), vec![(0, 1), (2, 2)]);

        let two_blocks = parse("<div><h1>A</h1></div><div><h1>B</h1></div>");
        assert_eq!(two_blocks.content().len(), 2);
        assert!(two_blocks.headings(HeadingScope::default()).is_empty());

        let mut doc = doc;
        doc.edit_content(|nodes| nodes.push(Node::text("tail")));
        assert_eq!(
            doc.to_html(),
            "<article>\n<main><h1>A</h1><p>x</p><h2>B</h2>tail</main>\n</article>"
        );
    }
}
