const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("hellip", '\u{2026}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("copy", '\u{a9}'),
];

// Longest reference we look for, including the `;`. Covers `&#x10FFFF;` and named
// references such as `&thetasym;`.
const MAX_REFERENCE_LEN: usize = 32;

/// Decodes character references. Unknown or unterminated references are kept verbatim.
pub(crate) fn decode(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .char_indices()
            .take(MAX_REFERENCE_LEN)
            .find(|(_, ch)| *ch == ';')
            .and_then(|(semi, _)| resolve(&tail[..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(reference: &str) -> Option<char> {
    if let Some(numeric) = reference.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    NAMED
        .iter()
        .find(|(name, _)| *name == reference)
        .map(|(_, ch)| *ch)
}

/// Named references this table cannot decode stay in the text as written, so they are
/// written back out unescaped.
fn starts_unknown_reference(tail: &str) -> bool {
    let Some(semi) = tail
        .char_indices()
        .take(MAX_REFERENCE_LEN)
        .find(|(_, ch)| *ch == ';')
        .map(|(idx, _)| idx)
    else {
        return false;
    };
    let name = &tail[..semi];
    name.starts_with(|ch: char| ch.is_ascii_alphabetic())
        && name.chars().all(|ch| ch.is_ascii_alphanumeric())
        && resolve(name).is_none()
}

pub(crate) fn escape_text(raw: &str, out: &mut String) {
    for (idx, ch) in raw.char_indices() {
        match ch {
            '&' if starts_unknown_reference(&raw[idx + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_attr(raw: &str, out: &mut String) {
    for (idx, ch) in raw.char_indices() {
        match ch {
            '&' if starts_unknown_reference(&raw[idx + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, escape_attr, escape_text};

    fn escaped(raw: &str) -> String {
        let mut out = String::new();
        escape_text(raw, &mut out);
        out
    }

    #[test]
    fn decodes_named_and_numeric_references() {
        assert_eq!(decode("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode("&lt;b&gt; &#65;&#x42;"), "<b> AB");
        assert_eq!(decode("it&rsquo;s"), "it\u{2019}s");
    }

    #[test]
    fn keeps_unknown_references() {
        assert_eq!(decode("AT&T"), "AT&T");
        assert_eq!(decode("&bogus; & &#xZZ;"), "&bogus; & &#xZZ;");
    }

    #[test]
    fn unknown_named_references_are_written_back_verbatim() {
        assert_eq!(escaped(&decode("Caf&eacute; &rarr; &trade;")), "Caf&eacute; &rarr; &trade;");
        assert_eq!(escaped(&decode("Q&amp;A")), "Q&amp;A");
        assert_eq!(escaped("AT&T & co; &#38;"), "AT&amp;T &amp; co; &amp;#38;");

        let mut attr = String::new();
        escape_attr(&decode("&copy; &hearts;"), &mut attr);
        assert_eq!(attr, "\u{a9} &hearts;");
    }
}
