//! Fragment-to-element correspondence
//!
//! The text layer is rebuilt on every render, so matches recorded against
//! fragment indices have to be re-joined to whatever elements exist now.
//! Renderers create one element per non-empty fragment, in original order,
//! which makes a positional join the normal case. When the counts disagree
//! (a renderer split or merged runs) the join falls back to matching on
//! content.

use std::collections::HashMap;

use super::types::{RenderedTextElement, TextFragment};

/// How fragments were paired with rendered elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrespondenceStrategy {
    /// Non-empty fragment count equals element count: pair by position
    Positional,
    /// Counts differ: exact-text pass, then positional pass over leftovers
    ContentMatched,
}

/// Fragment index (original list) to element index (rendered list)
#[derive(Debug, Clone)]
pub struct Correspondence {
    pub strategy: CorrespondenceStrategy,
    map: HashMap<usize, usize>,
    /// Positional pairs whose texts disagreed
    pub text_mismatches: usize,
}

impl Correspondence {
    pub fn element_for(&self, fragment_index: usize) -> Option<usize> {
        self.map.get(&fragment_index).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Join the renderer's true fragment list to its rendered elements
pub fn correlate(fragments: &[TextFragment], elements: &[RenderedTextElement]) -> Correspondence {
    let visible: Vec<(usize, &TextFragment)> = fragments
        .iter()
        .enumerate()
        .filter(|(_, f)| f.has_visible_text())
        .collect();

    if visible.len() == elements.len() {
        positional(&visible, elements)
    } else {
        tracing::debug!(
            fragments = visible.len(),
            elements = elements.len(),
            "Fragment/element count mismatch, matching by content"
        );
        content_matched(&visible, elements)
    }
}

fn positional(visible: &[(usize, &TextFragment)], elements: &[RenderedTextElement]) -> Correspondence {
    let mut map = HashMap::with_capacity(visible.len());
    let mut text_mismatches = 0;

    for (element_index, ((fragment_index, fragment), element)) in
        visible.iter().zip(elements).enumerate()
    {
        if !same_text(&fragment.text, &element.text) {
            text_mismatches += 1;
        }
        map.insert(*fragment_index, element_index);
    }

    // Logged, not fatal
    if text_mismatches > 0 {
        tracing::warn!(
            text_mismatches,
            "Positional correspondence has text mismatches, highlights may be offset"
        );
    }

    Correspondence {
        strategy: CorrespondenceStrategy::Positional,
        map,
        text_mismatches,
    }
}

fn content_matched(
    visible: &[(usize, &TextFragment)],
    elements: &[RenderedTextElement],
) -> Correspondence {
    let mut map = HashMap::with_capacity(visible.len());
    let mut used = vec![false; elements.len()];

    // Pass 1: exact text, first unused element wins
    for (fragment_index, fragment) in visible {
        let found = elements
            .iter()
            .enumerate()
            .find(|(i, element)| !used[*i] && same_text(&fragment.text, &element.text));
        if let Some((element_index, _)) = found {
            used[element_index] = true;
            map.insert(*fragment_index, element_index);
        }
    }

    // Pass 2: leftovers paired in original order
    let mut free_elements = (0..elements.len()).filter(|i| !used[*i]);
    for (fragment_index, _) in visible {
        if map.contains_key(fragment_index) {
            continue;
        }
        match free_elements.next() {
            Some(element_index) => {
                map.insert(*fragment_index, element_index);
            }
            None => break,
        }
    }

    Correspondence {
        strategy: CorrespondenceStrategy::ContentMatched,
        map,
        text_mismatches: 0,
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a == b || a.trim() == b.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Rect;

    fn frag(text: &str) -> TextFragment {
        TextFragment::new(text, 0.0, 0.0, 10.0, 10.0)
    }

    fn el(text: &str) -> RenderedTextElement {
        RenderedTextElement::new(text, Rect::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_positional_fast_path_skips_blank_fragments() {
        let fragments = vec![frag("Alpha"), frag(" "), frag("Beta"), frag("Gamma")];
        let elements = vec![el("Alpha"), el("Beta"), el("Gamma")];
        let c = correlate(&fragments, &elements);

        assert_eq!(c.strategy, CorrespondenceStrategy::Positional);
        assert_eq!(c.element_for(0), Some(0));
        assert_eq!(c.element_for(1), None);
        assert_eq!(c.element_for(2), Some(1));
        assert_eq!(c.element_for(3), Some(2));
        assert_eq!(c.text_mismatches, 0);
    }

    #[test]
    fn test_positional_mismatch_is_counted_not_fatal() {
        let fragments = vec![frag("Alpha"), frag("Beta")];
        let elements = vec![el("Alpha"), el("Bet")];
        let c = correlate(&fragments, &elements);

        assert_eq!(c.strategy, CorrespondenceStrategy::Positional);
        assert_eq!(c.text_mismatches, 1);
        assert_eq!(c.element_for(1), Some(1));
    }

    #[test]
    fn test_count_mismatch_uses_content_matching() {
        // Renderer dropped "Beta" and inserted an unrelated element up front
        let fragments = vec![frag("Alpha"), frag("Beta"), frag("Gamma")];
        let elements = vec![el("header"), el("Alpha"), el("Gamma"), el("Delta")];
        let c = correlate(&fragments, &elements);

        assert_eq!(c.strategy, CorrespondenceStrategy::ContentMatched);
        assert_eq!(c.element_for(0), Some(1));
        assert_eq!(c.element_for(2), Some(2));
        // Leftover "Beta" takes the first unused element
        assert_eq!(c.element_for(1), Some(0));
    }

    #[test]
    fn test_content_matching_handles_duplicates_greedily() {
        let fragments = vec![frag("the"), frag("cat"), frag("the")];
        let elements = vec![el("the"), el("the")];
        let c = correlate(&fragments, &elements);

        assert_eq!(c.strategy, CorrespondenceStrategy::ContentMatched);
        assert_eq!(c.element_for(0), Some(0));
        assert_eq!(c.element_for(2), Some(1));
        assert_eq!(c.element_for(1), None);
        assert_eq!(c.len(), 2);
    }
}
