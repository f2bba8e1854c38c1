use super::entities;
use super::{heading_level_of, is_void_element, Document, Element, Node};

// Dropped together with their contents.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];
const UNWRAPPED_ELEMENTS: &[&str] = &["html", "body"];
// Opening one of these implicitly closes an open paragraph.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "figure", "footer", "header",
    "hr", "ol", "p", "pre", "section", "table", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

/// Parses an HTML fragment or document into a [`Document`].
///
/// Never fails: unmatched end tags are ignored and unclosed elements are closed at the end
/// of input.
pub fn parse(html: &str) -> Document {
    let mut tokenizer = Tokenizer::new(html);
    let mut builder = TreeBuilder::default();
    while let Some(token) = tokenizer.next_token() {
        builder.push(token);
    }
    builder.finish()
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return None;
            }
            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                return Some(Token::Text(entities::decode(&rest[..end])));
            }

            if rest.starts_with("<!--") {
                self.pos += rest.find("-->").map(|idx| idx + 3).unwrap_or(rest.len());
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past('>');
                continue;
            }
            if let Some(after) = rest.strip_prefix("</") {
                if after.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                    let name = read_name(after);
                    self.skip_past('>');
                    return Some(Token::End { name });
                }
            } else if rest[1..].starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                let token = self.read_start_tag();
                if let Token::Start { name, .. } = &token {
                    if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                        self.skip_raw_text(name);
                        continue;
                    }
                }
                return Some(token);
            }

            // A stray `<` that does not open a tag.
            self.pos += 1;
            return Some(Token::Text("<".to_string()));
        }
    }

    fn skip_past(&mut self, needle: char) {
        let rest = self.rest();
        self.pos += rest
            .find(needle)
            .map(|idx| idx + needle.len_utf8())
            .unwrap_or(rest.len());
    }

    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let lowered = self.rest().to_ascii_lowercase();
        match lowered.find(&closing) {
            Some(idx) => {
                self.pos += idx;
                self.skip_past('>');
            }
            None => self.pos = self.src.len(),
        }
    }

    fn read_start_tag(&mut self) -> Token {
        // Skip `<`.
        self.pos += 1;
        let name = read_name(self.rest());
        self.pos += name.len();
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let key_len = rest
                .find(|ch: char| ch.is_ascii_whitespace() || matches!(ch, '=' | '>' | '/'))
                .unwrap_or(rest.len());
            let key = rest[..key_len].to_ascii_lowercase();
            self.pos += key_len;
            self.skip_whitespace();

            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attr_value()
            } else {
                String::new()
            };
            if !key.is_empty() {
                attrs.push((key, value));
            }
        }

        Token::Start {
            name,
            attrs,
            self_closing,
        }
    }

    fn read_attr_value(&mut self) -> String {
        let rest = self.rest();
        if let Some(quote) = rest.chars().next().filter(|ch| *ch == '"' || *ch == '\'') {
            let body = &rest[1..];
            let end = body.find(quote).unwrap_or(body.len());
            self.pos += 1 + end + usize::from(end < body.len());
            return entities::decode(&body[..end]);
        }
        let end = rest
            .find(|ch: char| ch.is_ascii_whitespace() || ch == '>')
            .unwrap_or(rest.len());
        self.pos += end;
        entities::decode(&rest[..end])
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|ch: char| ch.is_ascii_whitespace());
        self.pos += rest.len() - trimmed.len();
    }
}

fn read_name(src: &str) -> String {
    let len = src
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == ':'))
        .unwrap_or(src.len());
    src[..len].to_ascii_lowercase()
}

#[derive(Default)]
struct TreeBuilder {
    roots: Vec<Node>,
    open: Vec<Element>,
    in_head: bool,
}

impl TreeBuilder {
    fn push(&mut self, token: Token) {
        if self.in_head {
            if matches!(&token, Token::End { name } if name == "head") {
                self.in_head = false;
            }
            return;
        }

        match token {
            Token::Text(text) => self.append(Node::Text(text)),
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                if UNWRAPPED_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                if name == "head" {
                    self.in_head = !self_closing;
                    return;
                }
                if CLOSES_PARAGRAPH.contains(&name.as_str()) || heading_level_of(&name).is_some()
                {
                    self.close_open("p");
                }
                if name == "li" && self.open.last().map(|el| el.name == "li").unwrap_or(false) {
                    self.close_open("li");
                }

                let element = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || element.is_void() {
                    self.append(Node::Element(element));
                } else {
                    self.open.push(element);
                }
            }
            Token::End { name } => {
                if UNWRAPPED_ELEMENTS.contains(&name.as_str()) || is_void_element(&name) {
                    return;
                }
                self.close_open(&name);
            }
        }
    }

    /// Closes the innermost open element called `name` and everything opened after it.
    fn close_open(&mut self, name: &str) {
        let Some(idx) = self.open.iter().rposition(|el| el.name == name) else {
            return;
        };
        while self.open.len() > idx {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if let Some(element) = self.open.pop() {
            self.append(Node::Element(element));
        }
    }

    fn append(&mut self, node: Node) {
        let children = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        match node {
            Node::Text(text) => match children.last_mut() {
                Some(Node::Text(prev)) => prev.push_str(&text),
                _ => children.push(Node::Text(text)),
            },
            other => children.push(other),
        }
    }

    fn finish(mut self) -> Document {
        while !self.open.is_empty() {
            self.close_top();
        }
        Document { nodes: self.roots }
    }
}
