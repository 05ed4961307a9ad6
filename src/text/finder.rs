//! Match finder
//!
//! Literal, case-insensitive, non-overlapping substring search over
//! reconstructed unit text.

use crate::config::SearchConfig;
use crate::document::{ReconstructedUnitText, SearchMatch};

/// Matches for one query, plus the units where the safety cap stopped the scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOutcome {
    /// Ordered by `(unit_index, char_offset)`
    pub matches: Vec<SearchMatch>,
    /// Units that had more occurrences than `max_matches_per_unit`
    pub capped_units: Vec<usize>,
}

impl FindOutcome {
    pub fn is_truncated(&self) -> bool {
        !self.capped_units.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchFinder {
    config: SearchConfig,
}

impl MatchFinder {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Queries under `min_query_chars` are refused. This is product policy
    /// (a one-letter query would light up the whole document), not a
    /// performance limit.
    pub fn accepts(&self, query: &str) -> bool {
        query.chars().count() >= self.config.min_query_chars.max(1)
    }

    /// Search every unit, in ascending unit order.
    pub fn find(&self, units: &[ReconstructedUnitText], query: &str) -> FindOutcome {
        let mut outcome = FindOutcome::default();
        if !self.accepts(query) {
            tracing::debug!("Query {:?} below minimum length, skipping search", query);
            return outcome;
        }

        let needle: Vec<char> = query.chars().map(fold_char).collect();
        let mut ordered: Vec<&ReconstructedUnitText> = units.iter().collect();
        ordered.sort_by_key(|unit| unit.unit_index);

        for unit in ordered {
            let (matches, capped) = self.scan_unit(unit, query, &needle);
            if capped {
                tracing::warn!(
                    unit = unit.unit_index,
                    cap = self.config.max_matches_per_unit,
                    "Per-unit match cap reached, remaining occurrences not reported"
                );
                outcome.capped_units.push(unit.unit_index);
            }
            outcome.matches.extend(matches);
        }

        outcome
    }

    /// Search a single unit. Returns the matches and whether the cap was hit.
    pub fn find_in_unit(&self, unit: &ReconstructedUnitText, query: &str) -> (Vec<SearchMatch>, bool) {
        if !self.accepts(query) {
            return (Vec::new(), false);
        }
        let needle: Vec<char> = query.chars().map(fold_char).collect();
        self.scan_unit(unit, query, &needle)
    }

    fn scan_unit(
        &self,
        unit: &ReconstructedUnitText,
        query: &str,
        needle: &[char],
    ) -> (Vec<SearchMatch>, bool) {
        let original: Vec<char> = unit.text.chars().collect();
        let haystack: Vec<char> = original.iter().copied().map(fold_char).collect();
        let n = needle.len();

        let mut matches = Vec::new();
        let mut capped = false;
        let mut pos = 0;

        while pos + n <= haystack.len() {
            if haystack[pos..pos + n] != *needle {
                pos += 1;
                continue;
            }
            if matches.len() >= self.config.max_matches_per_unit {
                capped = true;
                break;
            }

            matches.push(SearchMatch {
                query: query.to_string(),
                unit_index: unit.unit_index,
                char_offset: pos,
                excerpt: create_excerpt(&original, pos, n, self.config.excerpt_context),
                occurrence_in_unit: matches.len(),
                fragment_spans: unit.spans_for_range(pos, pos + n),
            });

            // Non-overlapping: resume after this match
            pos += n;
        }

        (matches, capped)
    }
}

/// Search with default settings
pub fn find_matches(units: &[ReconstructedUnitText], query: &str) -> Vec<SearchMatch> {
    MatchFinder::default().find(units, query).matches
}

/// One-to-one lowercase fold so folded offsets equal original offsets.
///
/// Deliberately lossy: chars whose lowercase form is several chars keep only
/// the first one ('İ' folds to 'i'), so a few multi-char case pairs
/// compare loosely.
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Create an excerpt around a match position
fn create_excerpt(text: &[char], position: usize, match_len: usize, context: usize) -> String {
    let match_end = (position + match_len).min(text.len());
    let mut start = position.saturating_sub(context);
    let mut end = (match_end + context).min(text.len());

    // Snap inward to word boundaries, never into the match itself
    if start > 0 && !text[start - 1].is_whitespace() {
        if let Some(ws) = text[start..position].iter().position(|c| c.is_whitespace()) {
            start += ws + 1;
        }
    }
    if end < text.len() && !text[end].is_whitespace() {
        if let Some(ws) = text[match_end..end].iter().rposition(|c| c.is_whitespace()) {
            end = match_end + ws;
        }
    }

    let excerpt: String = text[start..end]
        .iter()
        .map(|&c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let prefix = if start > 0 { "..." } else { "" };
    let suffix = if end < text.len() { "..." } else { "" };

    format!("{}{}{}", prefix, excerpt.trim(), suffix)
}
