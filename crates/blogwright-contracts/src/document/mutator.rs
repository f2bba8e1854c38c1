use crate::markup::{self, Element, HeadingScope, Node};

use super::DropZone;

pub const IMAGE_BLOCK_CLASS: &str = "blog-image";

/// Self-contained image block inserted by a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub url: String,
    pub description: String,
}

impl ImageBlock {
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
        }
    }

    pub fn to_node(&self) -> Node {
        let description = self.description.trim();
        let mut figure = Element::new("figure")
            .with_attr("class", IMAGE_BLOCK_CLASS)
            .with_child(Node::Element(
                Element::new("img")
                    .with_attr("src", self.url.as_str())
                    .with_attr("alt", description),
            ));
        if !description.is_empty() {
            figure = figure.with_child(Node::Element(
                Element::new("figcaption").with_child(Node::text(description)),
            ));
        }
        Node::Element(figure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Applied(String),
    /// The zone points at a section the document no longer has; nothing was changed.
    Stale,
}

/// Inserts `image` at `zone` and returns the re-rendered document.
pub fn mutate(html: &str, image: &ImageBlock, zone: DropZone, scope: HeadingScope) -> Mutation {
    let mut document = markup::parse(html);
    let headings = document.headings(scope);
    let Some(position) = insertion_index(document.content(), &headings, zone) else {
        tracing::debug!(%zone, "drop zone does not exist in the current document");
        return Mutation::Stale;
    };
    document.edit_content(|nodes| nodes.insert(position, image.to_node()));
    Mutation::Applied(document.to_html())
}

/// Like [`mutate`], but hands back the input untouched when the zone is stale.
pub fn mutate_html(html: &str, image: &ImageBlock, zone: DropZone, scope: HeadingScope) -> String {
    match mutate(html, image, zone, scope) {
        Mutation::Applied(updated) => updated,
        Mutation::Stale => html.to_string(),
    }
}

fn insertion_index(nodes: &[Node], headings: &[(usize, u8)], zone: DropZone) -> Option<usize> {
    match zone {
        DropZone::BeginningOfContent => Some(0),
        DropZone::EndOfContent => Some(nodes.len()),
        DropZone::BeforeSection(idx) => headings.get(idx).map(|(node, _)| *node),
        DropZone::AfterSection(idx) => {
            let (start, _) = *headings.get(idx)?;
            let end = headings
                .get(idx + 1)
                .map(|(node, _)| *node)
                .unwrap_or(nodes.len());
            let last_content = (start + 1..end)
                .rev()
                .find(|node| !nodes[*node].is_blank())
                .unwrap_or(start);
            Some(last_content + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{mutate, mutate_html, ImageBlock, Mutation};
    use crate::document::{analyze_html, DropZone};
    use crate::markup::{parse, HeadingScope, Node};

    const DOC: &str = "<h1>Intro</h1>\n<p>Hello</p>\n<h2>Details</h2><p>More</p><p>Even more</p>";

    fn image() -> ImageBlock {
        ImageBlock::new("https://img.example/cat.png", "A cat")
    }

    fn top_level(html: &str) -> Vec<String> {
        parse(html)
            .nodes
            .iter()
            .filter(|node| !node.is_blank())
            .map(|node| match node {
                Node::Element(el) => el.name.clone(),
                Node::Text(text) => format!("#{text}"),
            })
            .collect()
    }

    fn applied(zone: DropZone) -> String {
        match mutate(DOC, &image(), zone, HeadingScope::default()) {
            Mutation::Applied(html) => html,
            Mutation::Stale => panic!("zone {zone} unexpectedly stale"),
        }
    }

    #[test]
    fn image_block_renders_figure_with_caption() {
        let html = mutate_html("", &image(), DropZone::BeginningOfContent, HeadingScope::default());
        assert_eq!(
            html,
            "<figure class=\"blog-image\"><img src=\"https://img.example/cat.png\" alt=\"A cat\"><figcaption>A cat</figcaption></figure>"
        );
    }

    #[test]
    fn before_first_section_precedes_first_heading() {
        let html = applied(DropZone::BeforeSection(0));
        assert_eq!(top_level(&html), vec!["figure", "h1", "p", "h2", "p", "p"]);
        let sections = analyze_html(&html, HeadingScope::default());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].node_index, 1);
        assert_eq!(sections[0].title, "Intro");
    }

    #[test]
    fn after_section_lands_at_end_of_section_content() {
        let html = applied(DropZone::AfterSection(0));
        assert_eq!(top_level(&html), vec!["h1", "p", "figure", "h2", "p", "p"]);

        let html = applied(DropZone::AfterSection(1));
        assert_eq!(top_level(&html), vec!["h1", "p", "h2", "p", "p", "figure"]);
    }

    #[test]
    fn after_empty_section_follows_heading() {
        let html = mutate_html(
            "<h1>A</h1><h1>B</h1>",
            &image(),
            DropZone::AfterSection(0),
            HeadingScope::default(),
        );
        assert_eq!(top_level(&html), vec!["h1", "figure", "h1"]);
    }

    #[test]
    fn before_later_section_and_document_edges() {
        assert_eq!(
            top_level(&applied(DropZone::BeforeSection(1))),
            vec!["h1", "p", "figure", "h2", "p", "p"]
        );
        assert_eq!(
            top_level(&applied(DropZone::BeginningOfContent))[0],
            "figure"
        );
        assert_eq!(
            top_level(&applied(DropZone::EndOfContent)).last().cloned(),
            Some("figure".to_string())
        );
    }

    #[test]
    fn stale_zone_is_a_noop() {
        assert_eq!(
            mutate(DOC, &image(), DropZone::AfterSection(5), HeadingScope::default()),
            Mutation::Stale
        );
        assert_eq!(
            mutate_html(DOC, &image(), DropZone::AfterSection(5), HeadingScope::default()),
            DOC
        );
        assert_eq!(
            mutate_html(DOC, &image(), DropZone::BeforeSection(2), HeadingScope::default()),
            DOC
        );
    }

    #[test]
    fn heading_scope_changes_addressing() {
        let doc = "<h2>A</h2><h5>deep</h5><p>x</p>";
        let narrow = mutate_html(doc, &image(), DropZone::BeforeSection(1), HeadingScope::default());
        assert_eq!(narrow, doc);
        let wide = mutate_html(doc, &image(), DropZone::BeforeSection(1), HeadingScope::ALL);
        assert_eq!(top_level(&wide), vec!["h2", "figure", "h5", "p"]);
    }

    #[test]
    fn empty_description_drops_caption() {
        let block = ImageBlock::new("u.png", "  ");
        let html = mutate_html("<p>x</p>", &block, DropZone::EndOfContent, HeadingScope::default());
        assert_eq!(
            html,
            "<p>x</p><figure class=\"blog-image\"><img src=\"u.png\" alt=\"\"></figure>"
        );
    }

    #[test]
    fn drop_keeps_untouched_text_byte_for_byte() {
        let source = "<h1>Caf&eacute; &rarr; Bar</h1><p>Q&amp;A &trade;</p>";
        let html = mutate_html(source, &image(), DropZone::EndOfContent, HeadingScope::default());
        assert!(html.starts_with(source));
        assert!(!html.contains("&amp;eacute;"));
        assert_eq!(analyze_html(&html, HeadingScope::default())[0].title, "Caf&eacute; &rarr; Bar");
    }

    #[test]
    fn wrapped_document_is_addressed_inside_its_wrapper() {
        let source = "<article><h1>Intro</h1><p>a</p><h2>Next</h2><p>b</p></article>";
        let html = mutate_html(source, &image(), DropZone::BeforeSection(0), HeadingScope::default());
        assert_eq!(top_level(&html), vec!["article"]);
        assert!(html.starts_with("<article><figure class=\"blog-image\">"));

        let html = mutate_html(source, &image(), DropZone::AfterSection(1), HeadingScope::default());
        assert!(html.ends_with("<p>b</p><figure class=\"blog-image\"><img src=\"https://img.example/cat.png\" alt=\"A cat\"><figcaption>A cat</figcaption></figure></article>"));
        assert_eq!(
            mutate(source, &image(), DropZone::AfterSection(2), HeadingScope::default()),
            Mutation::Stale
        );
    }
}
