use serde::Serialize;

use crate::markup::{self, Document, HeadingScope};

/// A heading plus the content that follows it up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub index: usize,
    pub title: String,
    pub level: u8,
    pub text_content: String,
    /// Position of the heading in [`Document::content`].
    pub node_index: usize,
}

/// Splits a document into sections. Indices are stable for an unchanged document and are
/// the addressing space of [`super::DropZone`].
pub fn analyze(document: &Document, scope: HeadingScope) -> Vec<Section> {
    let nodes = document.content();
    let headings = document.headings(scope);
    headings
        .iter()
        .enumerate()
        .map(|(index, &(node_index, level))| {
            let end = headings
                .get(index + 1)
                .map(|(next, _)| *next)
                .unwrap_or(nodes.len());
            let title = nodes[node_index]
                .text_content()
                .split_whitespace()
                .collect::<Vec<&str>>()
                .join(" ");
            let text_content = nodes[node_index + 1..end]
                .iter()
                .map(|node| node.text_content().trim().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<String>>()
                .join("\n");
            Section {
                id: format!("section-{index}"),
                index,
                title,
                level,
                text_content,
                node_index,
            }
        })
        .collect()
}

pub fn analyze_html(html: &str, scope: HeadingScope) -> Vec<Section> {
    analyze(&markup::parse(html), scope)
}
