//! Lenient HTML parser.
//!
//! Never fails: malformed markup is recovered the way browsers mostly do it (stray end tags
//! are dropped, a handful of implied end tags are honoured) and the result is always
//! normalized to a single `html` root holding `head` then `body`.

use crate::dom::{Document, NodeData, NodeId};
use std::borrow::Cow;

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Content kept verbatim, never entity-decoded or escaped.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Content that is text-only but still carries character references.
pub const RCDATA_ELEMENTS: &[&str] = &["textarea", "title"];

const HEAD_ELEMENTS: &[&str] = &["base", "link", "meta", "style", "title", "script", "noscript"];

const P_CLOSERS: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav",
    "ol", "p", "pre", "section", "table", "ul",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parse an HTML string into a normalized [`Document`].
pub fn parse_html(input: &str) -> Document {
    let mut builder = TreeBuilder::new();
    let mut tokenizer = Tokenizer::new(input);
    while let Some(token) = tokenizer.next_token() {
        builder.process(token, &mut tokenizer);
    }
    let mut doc = builder.doc;
    normalize(&mut doc);
    doc
}

// ─── Tokenizer ───────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Text(String),
    Comment(String),
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn next_token(&mut self) -> Option<Token> {
        let rest = self.rest();
        if rest.is_empty() {
            return None;
        }

        if let Some(body) = rest.strip_prefix("<!--") {
            let (comment, consumed) = match body.find("-->") {
                Some(end) => (&body[..end], 4 + end + 3),
                None => (body, rest.len()),
            };
            self.pos += consumed;
            return Some(Token::Comment(comment.to_string()));
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            // Doctype and processing instructions are dropped.
            self.skip_past('>');
            return self.next_token();
        }

        if let Some(after) = rest.strip_prefix("</") {
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.pos += 2;
                let name = self.read_tag_name();
                self.skip_past('>');
                return Some(Token::EndTag(name));
            }
            if after.starts_with('>') {
                self.pos += 3;
                return self.next_token();
            }
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.pos += 1;
            return Some(self.read_start_tag());
        }

        // Text runs up to the next '<' that could open markup.
        let mut end = rest.len();
        for (i, _) in rest.match_indices('<').filter(|(i, _)| *i > 0) {
            let after = &rest[i + 1..];
            if after.starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
            {
                end = i;
                break;
            }
        }
        self.pos += end;
        Some(Token::Text(decode_entities(&rest[..end]).into_owned()))
    }

    fn skip_past(&mut self, ch: char) {
        match self.rest().find(ch) {
            Some(i) => self.pos += i + ch.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn read_tag_name(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_ascii_lowercase()
    }

    fn read_start_tag(&mut self) -> Token {
        let name = self.read_tag_name();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let name_end = rest
                .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
                .unwrap_or(rest.len())
                .max(1);
            let attr_name = rest[..name_end].to_ascii_lowercase();
            self.pos += name_end;
            self.skip_whitespace();

            let mut value = String::new();
            if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                value = self.read_attr_value();
            }

            // First occurrence wins, as in browsers.
            if !attrs.iter().any(|(n, _)| *n == attr_name) {
                attrs.push((attr_name, value));
            }
        }

        Token::StartTag {
            name,
            attrs,
            self_closing,
        }
    }

    fn read_attr_value(&mut self) -> String {
        let rest = self.rest();
        let quote = rest.chars().next();
        match quote {
            Some(q @ ('"' | '\'')) => {
                let body = &rest[1..];
                let (raw, consumed) = match body.find(q) {
                    Some(end) => (&body[..end], end + 2),
                    None => (body, rest.len()),
                };
                self.pos += consumed;
                decode_entities(raw).into_owned()
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                decode_entities(&rest[..end]).into_owned()
            }
        }
    }

    /// Consume everything up to the matching end tag of a raw-text element.
    fn read_raw_text(&mut self, tag: &str) -> String {
        let rest = self.rest();
        let lower = rest.to_ascii_lowercase();
        let needle = format!("</{}", tag);
        let end = lower.find(&needle).unwrap_or(rest.len());
        self.pos += end;
        if end < rest.len() {
            self.pos += needle.len();
            self.skip_past('>');
        }
        rest[..end].to_string()
    }
}

// ─── Tree builder ────────────────────────────────────────────────────────────

struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            doc: Document::new(),
            open: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn current_tag(&self) -> Option<&str> {
        self.open.last().and_then(|n| self.doc.tag_name(*n))
    }

    fn process(&mut self, token: Token, tokenizer: &mut Tokenizer<'_>) {
        match token {
            Token::Text(text) => {
                let parent = self.current();
                // Merge with a preceding text node so text stays contiguous.
                if let Some(last) = self.doc.children(parent).last().copied() {
                    if let NodeData::Text(existing) = self.doc.data(last) {
                        let merged = format!("{}{}", existing, text);
                        self.doc.set_text_content(last, &merged);
                        return;
                    }
                }
                let node = self.doc.create_text(&text);
                self.doc.append_child(parent, node);
            }
            Token::Comment(text) => {
                let node = self.doc.create_comment(&text);
                let parent = self.current();
                self.doc.append_child(parent, node);
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                while self
                    .current_tag()
                    .is_some_and(|open| closes_implicitly(open, &name))
                {
                    self.open.pop();
                }

                let node = self.doc.create_element(&name);
                for (attr, value) in &attrs {
                    self.doc.set_attr(node, attr, value);
                }
                let parent = self.current();
                self.doc.append_child(parent, node);

                if self_closing || is_void(&name) {
                    return;
                }
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    let raw = tokenizer.read_raw_text(&name);
                    if !raw.is_empty() {
                        let text = self.doc.create_text(&raw);
                        self.doc.append_child(node, text);
                    }
                    return;
                }
                if RCDATA_ELEMENTS.contains(&name.as_str()) {
                    let raw = tokenizer.read_raw_text(&name);
                    if !raw.is_empty() {
                        let text = self.doc.create_text(&decode_entities(&raw));
                        self.doc.append_child(node, text);
                    }
                    return;
                }
                self.open.push(node);
            }
            Token::EndTag(name) => {
                let found = self
                    .open
                    .iter()
                    .rposition(|n| self.doc.tag_name(*n) == Some(name.as_str()));
                if let Some(index) = found {
                    self.open.truncate(index);
                }
            }
        }
    }
}

fn closes_implicitly(open: &str, incoming: &str) -> bool {
    match open {
        "p" => P_CLOSERS.contains(&incoming),
        "li" => incoming == "li",
        "dt" | "dd" => matches!(incoming, "dt" | "dd"),
        "td" | "th" => matches!(incoming, "td" | "th" | "tr" | "tbody" | "thead" | "tfoot"),
        "tr" => matches!(incoming, "tr" | "tbody" | "thead" | "tfoot"),
        "option" => matches!(incoming, "option" | "optgroup"),
        _ => false,
    }
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Rebuild the top level as `html > (head, body)`, moving loose nodes where a browser would.
fn normalize(doc: &mut Document) {
    let root = doc.root();
    let top: Vec<NodeId> = doc.children(root).to_vec();

    let existing_html = top
        .iter()
        .copied()
        .find(|n| doc.tag_name(*n) == Some("html"));

    let html = doc.create_element("html");
    let head = doc.create_element("head");
    let body = doc.create_element("body");

    // Flatten: the children of a parsed <html> take its place in the sequence.
    let mut sequence = Vec::new();
    for node in top {
        doc.detach(node);
        if Some(node) == existing_html {
            copy_attrs(doc, node, html);
            let inner: Vec<NodeId> = doc.children(node).to_vec();
            for child in inner {
                doc.detach(child);
                sequence.push(child);
            }
        } else {
            sequence.push(node);
        }
    }

    let mut in_body = false;
    for node in sequence {
        let tag = doc.tag_name(node).map(str::to_string);
        match tag.as_deref() {
            Some("head") => {
                copy_attrs(doc, node, head);
                move_children(doc, node, head);
            }
            Some("body") => {
                copy_attrs(doc, node, body);
                move_children(doc, node, body);
                in_body = true;
            }
            Some(tag) if !in_body && HEAD_ELEMENTS.contains(&tag) => {
                doc.append_child(head, node);
            }
            Some(_) => {
                doc.append_child(body, node);
                in_body = true;
            }
            None => {
                let (is_text, is_blank) = match doc.data(node) {
                    NodeData::Text(t) => (true, t.trim().is_empty()),
                    _ => (false, false),
                };
                if is_blank {
                    continue;
                }
                if !is_text && !in_body {
                    doc.append_child(head, node);
                } else {
                    doc.append_child(body, node);
                    in_body |= is_text;
                }
            }
        }
    }

    doc.append_child(root, html);
    doc.append_child(html, head);
    doc.append_child(html, body);
}

fn copy_attrs(doc: &mut Document, from: NodeId, to: NodeId) {
    let attrs = doc
        .element(from)
        .map(|el| el.attrs.clone())
        .unwrap_or_default();
    for attr in attrs {
        if !doc.has_attr(to, &attr.name) {
            doc.set_attr(to, &attr.name, &attr.value);
        }
    }
}

fn move_children(doc: &mut Document, from: NodeId, to: NodeId) {
    let children: Vec<NodeId> = doc.children(from).to_vec();
    for child in children {
        doc.append_child(to, child);
    }
}

// ─── Character references ────────────────────────────────────────────────────

/// Decode the character references templates realistically contain.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|end| *end <= 12) {
            Some(end) => match resolve_reference(&tail[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "deg" => '\u{b0}',
        "euro" => '\u{20ac}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_tags(doc: &Document) -> Vec<String> {
        let body = doc.body().unwrap();
        doc.element_children(body)
            .map(|n| doc.tag_name(n).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_fragment_is_wrapped_in_html_head_body() {
        let doc = parse_html("<h1>Title</h1><p>Body</p>");
        let html = doc.document_element().unwrap();
        let tops: Vec<_> = doc
            .element_children(html)
            .map(|n| doc.tag_name(n).unwrap().to_string())
            .collect();
        assert_eq!(tops, vec!["head", "body"]);
        assert_eq!(body_tags(&doc), vec!["h1", "p"]);
    }

    #[test]
    fn test_head_elements_before_content_go_to_head() {
        let doc = parse_html("<title>T</title><style>p{}</style><div>x</div>");
        let head = doc.head().unwrap();
        assert_eq!(doc.element_children(head).count(), 2);
        assert_eq!(body_tags(&doc), vec!["div"]);
    }

    #[test]
    fn test_unquoted_and_boolean_attributes() {
        let doc = parse_html("<img src=x alt='a b' hidden>");
        let img = doc.find_element(|d, n| d.tag_name(n) == Some("img")).unwrap();
        assert_eq!(doc.attr(img, "src"), Some("x"));
        assert_eq!(doc.attr(img, "alt"), Some("a b"));
        assert_eq!(doc.attr(img, "hidden"), Some(""));
        assert!(doc.children(img).is_empty());
    }

    #[test]
    fn test_implied_end_tags() {
        let doc = parse_html("<ul><li>a<li>b</ul><p>one<p>two");
        let ul = doc.find_element(|d, n| d.tag_name(n) == Some("ul")).unwrap();
        assert_eq!(doc.element_children(ul).count(), 2);
        assert_eq!(body_tags(&doc), vec!["ul", "p", "p"]);
    }

    #[test]
    fn test_script_content_is_raw() {
        let doc = parse_html("<body><script>if (a < b && c) {}</script></body>");
        let script = doc
            .find_element(|d, n| d.tag_name(n) == Some("script"))
            .unwrap();
        assert_eq!(doc.text_content(script), "if (a < b && c) {}");
    }

    #[test]
    fn test_stray_end_tags_are_ignored() {
        let doc = parse_html("<div>a</span>b</div>");
        let div = doc.find_element(|d, n| d.tag_name(n) == Some("div")).unwrap();
        assert_eq!(doc.text_content(div), "ab");
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42;"), "a & b <c> AB");
        assert_eq!(decode_entities("&unknown; & done"), "&unknown; & done");
    }

    #[test]
    fn test_trailing_nodes_after_html_land_in_body() {
        let doc = parse_html("<html><body><p>x</p></body></html><script data-x></script>");
        assert_eq!(body_tags(&doc), vec!["p", "script"]);
    }

    #[test]
    fn test_lone_less_than_is_text() {
        let doc = parse_html("<p>1 < 2</p>");
        let p = doc.find_element(|d, n| d.tag_name(n) == Some("p")).unwrap();
        assert_eq!(doc.text_content(p), "1 < 2");
    }
}
