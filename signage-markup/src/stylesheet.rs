//! Minimal `<style>` sheet support: simple selectors, descendant combinator and
//! specificity ordering. Enough for templates to drive computed values, and reused as
//! the selector engine for locating nodes.

use crate::dom::{Document, NodeId};
use crate::error::{MarkupError, MarkupResult};
use crate::style::{split_top_level, StyleDeclaration};

/// (id count, class/attribute count, type count)
pub type Specificity = (u32, u32, u32);

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|c| doc.classes(node).any(|have| have == c))
        {
            return false;
        }
        self.attrs.iter().all(|a| match (&a.value, doc.attr(node, &a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(want), Some(have)) => want == have,
        })
    }
}

/// A compound selector chain joined by descendant combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    pub fn parse(text: &str) -> MarkupResult<Self> {
        let unsupported = |reason: &str| MarkupError::UnsupportedSelector {
            selector: text.to_string(),
            reason: reason.to_string(),
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(unsupported("empty selector"));
        }
        if text.contains([':', '>', '+', '~']) {
            return Err(unsupported("only descendant combinators and simple selectors are supported"));
        }
        let compounds = text
            .split_whitespace()
            .map(|part| parse_compound(part).ok_or_else(|| unsupported("malformed compound selector")))
            .collect::<MarkupResult<Vec<_>>>()?;
        Ok(Self { compounds })
    }

    pub fn specificity(&self) -> Specificity {
        self.compounds.iter().fold((0, 0, 0), |(a, b, c), comp| {
            (
                a + comp.id.is_some() as u32,
                b + (comp.classes.len() + comp.attrs.len()) as u32,
                c + comp.tag.is_some() as u32,
            )
        })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((subject, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(doc, node) {
            return false;
        }
        let mut ancestors = doc.ancestors(node);
        rest.iter()
            .rev()
            .all(|compound| ancestors.any(|a| compound.matches(doc, a)))
    }
}

fn parse_compound(part: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut chars = part.char_indices().peekable();
    let ident_end = |from: usize| {
        part[from..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .map_or(part.len(), |i| from + i)
    };

    while let Some((i, ch)) = chars.next() {
        let (kind, start) = match ch {
            '*' if i == 0 => continue,
            '.' | '#' => (ch, i + 1),
            '[' => {
                let close = part[i..].find(']')? + i;
                let inner = &part[i + 1..close];
                let attr = match inner.split_once('=') {
                    Some((name, value)) => AttrSelector {
                        name: name.trim().to_ascii_lowercase(),
                        value: Some(value.trim().trim_matches(['"', '\'']).to_string()),
                    },
                    None => AttrSelector {
                        name: inner.trim().to_ascii_lowercase(),
                        value: None,
                    },
                };
                if attr.name.is_empty() {
                    return None;
                }
                compound.attrs.push(attr);
                while chars.peek().is_some_and(|(j, _)| *j <= close) {
                    chars.next();
                }
                continue;
            }
            c if i == 0 && c.is_ascii_alphabetic() => ('t', i),
            _ => return None,
        };
        let end = ident_end(start);
        if end == start {
            return None;
        }
        let ident = &part[start..end];
        match kind {
            '.' => compound.classes.push(ident.to_string()),
            '#' => compound.id = Some(ident.to_string()),
            _ => compound.tag = Some(ident.to_ascii_lowercase()),
        }
        while chars.peek().is_some_and(|(j, _)| *j < end) {
            chars.next();
        }
    }
    Some(compound)
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub specificity: Specificity,
    pub order: usize,
    pub declarations: StyleDeclaration,
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Self::default();
        sheet.append(css);
        sheet
    }

    /// Collect every `<style>` element of the document, in document order.
    pub fn from_document(doc: &Document) -> Self {
        let mut sheet = Self::default();
        for style in doc.find_elements(|d, n| d.tag_name(n) == Some("style")) {
            sheet.append(&doc.text_content(style));
        }
        sheet
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn append(&mut self, css: &str) {
        let css = strip_comments(css);
        let mut rest = css.as_str();
        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let Some(close) = matching_brace(&rest[open..]).map(|c| c + open) else {
                break;
            };
            let body = &rest[open + 1..close];
            rest = &rest[close + 1..];

            if prelude.starts_with('@') {
                tracing::trace!(prelude, "skipping at-rule");
                continue;
            }
            let declarations = StyleDeclaration::parse(body);
            for selector_text in split_top_level(prelude, ',') {
                match Selector::parse(selector_text) {
                    Ok(selector) => {
                        let order = self.rules.len();
                        self.rules.push(Rule {
                            specificity: selector.specificity(),
                            selector,
                            order,
                            declarations: declarations.clone(),
                        });
                    }
                    Err(e) => tracing::trace!(error = %e, "skipping rule"),
                }
            }
        }
    }

    /// Declaration blocks applying to `node`, weakest first.
    pub fn matching(&self, doc: &Document, node: NodeId) -> Vec<&StyleDeclaration> {
        let mut hits: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(doc, node))
            .collect();
        hits.sort_by_key(|r| (r.specificity, r.order));
        hits.into_iter().map(|r| &r.declarations).collect()
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Index of the brace closing the one at position 0.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// First element in document order matching `selector`.
pub fn select_first(doc: &Document, selector: &str) -> MarkupResult<Option<NodeId>> {
    let selector = Selector::parse(selector)?;
    Ok(doc.find_element(|d, n| selector.matches(d, n)))
}

/// Every element in document order matching `selector`.
pub fn select_all(doc: &Document, selector: &str) -> MarkupResult<Vec<NodeId>> {
    let selector = Selector::parse(selector)?;
    Ok(doc.find_elements(|d, n| selector.matches(d, n)))
}
