//! Section text walker
//!
//! Collects a content document's text nodes in document order, the way a
//! browser text-node walker would, skipping `head`, `script` and `style`.
//! Each node carries its CFI steps from the root element so a char range
//! can later be turned into a flow position.
//!
//! Comments and processing instructions can split one CFI text chunk into
//! several nodes; each node records where it starts inside its chunk.

use std::borrow::Cow;

use roxmltree::{Document, Node, ParsingOptions};

use crate::cfi::{element_step, text_step};
use crate::document::ReconstructedUnitText;
use crate::error::Result;
use crate::text::reconstruct_flow;

const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style"];

/// HTML named entities seen in EPUB2 content, which XML parsers reject
const HTML_ENTITIES: &[(&str, char)] = &[
    ("nbsp", '\u{a0}'),
    ("ensp", '\u{2002}'),
    ("emsp", '\u{2003}'),
    ("thinsp", '\u{2009}'),
    ("shy", '\u{ad}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("laquo", '\u{ab}'),
    ("raquo", '\u{bb}'),
    ("hellip", '\u{2026}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{b7}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("deg", '\u{b0}'),
    ("sect", '\u{a7}'),
    ("para", '\u{b6}'),
    ("dagger", '\u{2020}'),
    ("times", '\u{d7}'),
];

/// One text node of a section document
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    /// Position in document order; the fragment index for this section
    pub ordinal: usize,
    pub text: String,
    /// CFI steps below the root element, ending on the text step
    pub steps: Vec<u32>,
    /// Char offset of this node inside its CFI text chunk
    pub chunk_offset: usize,
}

impl TextNode {
    /// CFI character offset for a char offset local to this node
    pub fn cfi_offset(&self, local: usize) -> usize {
        self.chunk_offset + local
    }
}

/// Parse `markup` and collect its text nodes.
///
/// DTDs are allowed: XHTML content documents routinely declare one.
pub fn walk_section(markup: &str) -> Result<Vec<TextNode>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let markup = decode_html_entities(markup);
    let doc = Document::parse_with_options(&markup, options)?;

    let mut nodes = Vec::new();
    let mut steps = Vec::new();
    visit(doc.root_element(), &mut steps, &mut nodes);
    Ok(nodes)
}

/// Rewrite known HTML named entities as numeric references. XML's own
/// entities and unknown names are left alone.
fn decode_html_entities(markup: &str) -> Cow<'_, str> {
    if !markup.contains('&') {
        return Cow::Borrowed(markup);
    }

    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let entity = tail
            .find(';')
            .filter(|&end| end > 0 && tail[..end].chars().all(|c| c.is_ascii_alphanumeric()))
            .and_then(|end| {
                HTML_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == &tail[..end])
                    .map(|(_, ch)| (end, *ch))
            });
        match entity {
            Some((end, ch)) => {
                out.push_str(&format!("&#{};", ch as u32));
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn visit(element: Node<'_, '_>, steps: &mut Vec<u32>, out: &mut Vec<TextNode>) {
    let mut elements_seen = 0;
    let mut chunk_offset = 0;

    for child in element.children() {
        if child.is_element() {
            if !SKIPPED_ELEMENTS.contains(&child.tag_name().name()) {
                steps.push(element_step(elements_seen));
                visit(child, steps, out);
                steps.pop();
            }
            elements_seen += 1;
            chunk_offset = 0;
        } else if child.is_text() {
            let Some(text) = child.text() else { continue };
            let mut node_steps = steps.clone();
            node_steps.push(text_step(elements_seen));
            out.push(TextNode {
                ordinal: out.len(),
                text: text.to_string(),
                steps: node_steps,
                chunk_offset,
            });
            chunk_offset += text.chars().count();
        }
    }
}

/// Searchable text for a walked section
pub fn section_text(section: usize, nodes: &[TextNode]) -> ReconstructedUnitText {
    let texts: Vec<&str> = nodes.iter().map(|node| node.text.as_str()).collect();
    reconstruct_flow(section, &texts)
}
