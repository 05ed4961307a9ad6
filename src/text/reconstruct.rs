//! Text reconstruction
//!
//! Turns a unit's raw fragments into one linear, searchable string plus the
//! fragment map used to project matches back onto rendered elements.
//!
//! Paginated fragments arrive positioned and in whatever order the content
//! stream drew them, frequently without the whitespace between words. Flowed
//! text nodes are already in reading order and keep their whitespace.

use crate::config::LayoutConfig;
use crate::document::{FragmentMapping, ReconstructedUnitText};
use crate::pdf::TextFragment;

/// Rebuild one page's text in reading order (top-to-bottom, left-to-right).
///
/// Mappings are keyed by each fragment's index in `fragments` as given, not
/// its sorted position: rendered text elements are created in that original
/// order. Whitespace-only fragments produce neither text nor a mapping, but
/// they still force a word break between their neighbours.
pub fn reconstruct_page(
    unit_index: usize,
    fragments: &[TextFragment],
    layout: &LayoutConfig,
) -> ReconstructedUnitText {
    let mut text = String::new();
    let mut char_len = 0usize;
    let mut mappings = Vec::new();

    for line in group_lines(fragments, layout.line_tolerance) {
        let mut prev: Option<&TextFragment> = None;
        let mut blank_between = false;

        for idx in line {
            let fragment = &fragments[idx];
            if !fragment.has_visible_text() {
                blank_between = true;
                continue;
            }

            match prev {
                None if char_len > 0 => {
                    text.push(layout.line_separator);
                    char_len += 1;
                }
                Some(p) => {
                    let gap = fragment.x - p.right();
                    let boundary_has_space = text.ends_with(char::is_whitespace)
                        || fragment.text.starts_with(char::is_whitespace);
                    if (blank_between || gap > layout.gap_threshold) && !boundary_has_space {
                        text.push(' ');
                        char_len += 1;
                    }
                }
                None => {}
            }

            let fragment_len = fragment.text.chars().count();
            mappings.push(FragmentMapping {
                fragment_index: idx,
                start: char_len,
                end: char_len + fragment_len,
            });
            text.push_str(&fragment.text);
            char_len += fragment_len;

            prev = Some(fragment);
            blank_between = false;
        }
    }

    ReconstructedUnitText {
        unit_index,
        text,
        mappings,
    }
}

/// Group fragment indices into lines, each line ordered left-to-right.
///
/// Ordering ties fall back to the original index so the same input always
/// yields the same lines.
fn group_lines(fragments: &[TextFragment], tolerance: f32) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..fragments.len()).collect();
    order.sort_by(|&a, &b| {
        let (fa, fb) = (&fragments[a], &fragments[b]);
        fb.y.total_cmp(&fa.y)
            .then(fa.x.total_cmp(&fb.x))
            .then(a.cmp(&b))
    });

    let mut lines: Vec<Vec<usize>> = Vec::new();
    let mut line_y = 0.0f32;
    for idx in order {
        let y = fragments[idx].y;
        match lines.last_mut() {
            Some(line) if (y - line_y).abs() <= tolerance => line.push(idx),
            _ => {
                lines.push(vec![idx]);
                line_y = y;
            }
        }
    }

    for line in &mut lines {
        line.sort_by(|&a, &b| fragments[a].x.total_cmp(&fragments[b].x).then(a.cmp(&b)));
    }
    lines
}

/// Concatenate flowed text nodes in document order.
///
/// No separators are synthesized; node ordinals are the fragment indices.
pub fn reconstruct_flow<S: AsRef<str>>(unit_index: usize, nodes: &[S]) -> ReconstructedUnitText {
    let mut text = String::new();
    let mut char_len = 0usize;
    let mut mappings = Vec::with_capacity(nodes.len());

    for (ordinal, node) in nodes.iter().enumerate() {
        let node = node.as_ref();
        let node_len = node.chars().count();
        if node_len == 0 {
            continue;
        }
        mappings.push(FragmentMapping {
            fragment_index: ordinal,
            start: char_len,
            end: char_len + node_len,
        });
        text.push_str(node);
        char_len += node_len;
    }

    ReconstructedUnitText {
        unit_index,
        text,
        mappings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32, y: f32, width: f32) -> TextFragment {
        TextFragment::new(text, x, y, width, 10.0)
    }

    /// Rebuild the string from fragment texts and the synthesized characters
    /// that sit between mappings.
    fn assert_round_trip(unit: &ReconstructedUnitText, fragments: &[TextFragment]) {
        let chars: Vec<char> = unit.text.chars().collect();
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for mapping in &unit.mappings {
            assert!(mapping.start >= cursor, "mappings overlap or go backwards");
            for &c in &chars[cursor..mapping.start] {
                assert!(c == ' ', "unexpected synthesized char {:?}", c);
                rebuilt.push(c);
            }
            rebuilt.push_str(&fragments[mapping.fragment_index].text);
            cursor = mapping.end;
        }
        assert_eq!(cursor, chars.len());
        assert_eq!(rebuilt, unit.text);
    }

    #[test]
    fn test_hello_world_example() {
        let fragments = vec![
            frag("Hello", 0.0, 700.0, 25.0),
            frag(" World", 25.0, 700.0, 30.0),
            frag("!", 55.0, 700.0, 3.0),
        ];
        let unit = reconstruct_page(0, &fragments, &LayoutConfig::default());
        assert_eq!(unit.text, "Hello World!");
        assert_round_trip(&unit, &fragments);
    }

    #[test]
    fn test_infers_space_from_gap() {
        let fragments = vec![frag("Hello", 0.0, 700.0, 25.0), frag("World", 30.0, 700.0, 25.0)];
        let unit = reconstruct_page(0, &fragments, &LayoutConfig::default());
        assert_eq!(unit.text, "Hello World");
        assert_eq!(unit.mappings[1].start, 6);
        assert_round_trip(&unit, &fragments);
    }

    #[test]
    fn test_no_space_for_split_word() {
        // Kerned run split mid-word: gap below threshold
        let fragments = vec![frag("recon", 0.0, 700.0, 25.0), frag("struct", 26.0, 700.0, 30.0)];
        let unit = reconstruct_page(0, &fragments, &LayoutConfig::default());
        assert_eq!(unit.text, "reconstruct");
    }

    #[test]
    fn test_out_of_order_fragments_use_original_indices() {
        // Drawn bottom line first, and right-to-left within the top line
        let fragments = vec![
            frag("second", 0.0, 680.0, 30.0),
            frag("line", 40.0, 700.0, 20.0),
            frag("first", 0.0, 700.5, 25.0),
        ];
        let unit = reconstruct_page(4, &fragments, &LayoutConfig::default());
        assert_eq!(unit.text, "first line second");
        let order: Vec<usize> = unit.mappings.iter().map(|m| m.fragment_index).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert_eq!(unit.unit_index, 4);
        assert_round_trip(&unit, &fragments);
    }

    #[test]
    fn test_whitespace_fragments_have_no_mapping() {
        let fragments = vec![
            frag("alpha", 0.0, 700.0, 25.0),
            frag(" ", 25.0, 700.0, 1.0),
            frag("beta", 26.0, 700.0, 20.0),
            frag("", 60.0, 700.0, 0.0),
        ];
        let unit = reconstruct_page(0, &fragments, &LayoutConfig::default());
        assert_eq!(unit.text, "alpha beta");
        let indices: Vec<usize> = unit.mappings.iter().map(|m| m.fragment_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_round_trip(&unit, &fragments);
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let fragments = vec![
            frag("b", 10.0, 500.0, 5.0),
            frag("a", 10.0, 500.0, 5.0),
            frag("c", 0.0, 501.0, 5.0),
        ];
        let first = reconstruct_page(0, &fragments, &LayoutConfig::default());
        for _ in 0..10 {
            assert_eq!(reconstruct_page(0, &fragments, &LayoutConfig::default()), first);
        }
    }

    #[test]
    fn test_empty_page() {
        let unit = reconstruct_page(2, &[], &LayoutConfig::default());
        assert!(unit.text.is_empty());
        assert!(unit.mappings.is_empty());
    }

    #[test]
    fn test_flow_concatenation() {
        let unit = reconstruct_flow(1, &["Call me ", "Ishmael", ". Some years ago"]);
        assert_eq!(unit.text, "Call me Ishmael. Some years ago");
        assert_eq!(unit.mappings[1].start, 8);
        assert_eq!(unit.mappings[1].end, 15);
        assert_eq!(unit.mappings[2].fragment_index, 2);
    }
}
