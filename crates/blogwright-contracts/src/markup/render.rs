use super::entities::{escape_attr, escape_text};
use super::{Element, Node};

pub(crate) fn render_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_text(text, out),
        Node::Element(element) => write_element(element, out),
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
    if element.is_void() {
        return;
    }
    for child in &element.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use crate::markup::{parse, Element, Node};

    #[test]
    fn renders_parsed_markup_canonically() {
        let doc = parse("<H1 ID=top>Fish &amp; chips</H1>\n<p>a<br/>b</p>");
        assert_eq!(
            doc.to_html(),
            "<h1 id=\"top\">Fish &amp; chips</h1>\n<p>a<br>b</p>"
        );
    }

    #[test]
    fn escapes_attribute_values() {
        let element = Element::new("img").with_attr("alt", "say \"hi\" <now>");
        let doc = crate::markup::Document {
            nodes: vec![Node::Element(element)],
        };
        assert_eq!(
            doc.to_html(),
            "<img alt=\"say &quot;hi&quot; &lt;now&gt;\">"
        );
    }

    #[test]
    fn reparsing_rendered_output_is_stable() {
        let source = "<h2>One</h2><p>x &lt; y</p><figure><img src=\"a.png\"><figcaption>c</figcaption></figure>";
        let first = parse(source).to_html();
        assert_eq!(parse(&first).to_html(), first);
    }
}
