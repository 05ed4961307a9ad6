//! Core document types
//!
//! Format-agnostic types shared by the paginated (PDF) and flowed (EPUB)
//! halves of the engine. All text offsets are Unicode scalar (char) offsets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Re-express this rect relative to `origin`'s top-left corner
    pub fn relative_to(&self, origin: &Rect) -> Rect {
        Rect::new(self.x - origin.x, self.y - origin.y, self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Where one fragment's text landed in a reconstructed unit string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMapping {
    /// Index in the renderer's unmodified fragment list
    pub fragment_index: usize,
    pub start: usize,
    pub end: usize,
}

impl FragmentMapping {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// One unit's searchable text plus the fragment map used for back-projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructedUnitText {
    pub unit_index: usize,
    pub text: String,
    /// Ascending, non-overlapping, in string-offset order
    pub mappings: Vec<FragmentMapping>,
}

impl ReconstructedUnitText {
    pub fn empty(unit_index: usize) -> Self {
        Self {
            unit_index,
            text: String::new(),
            mappings: Vec::new(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Text between two char offsets
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Intersect `[start, end)` with every overlapping mapping, clipped
    pub fn spans_for_range(&self, start: usize, end: usize) -> Vec<FragmentSpan> {
        self.mappings
            .iter()
            .filter(|m| m.overlaps(start, end))
            .map(|m| {
                let span_start = start.max(m.start);
                let span_end = end.min(m.end);
                FragmentSpan {
                    fragment_index: m.fragment_index,
                    start: span_start,
                    end: span_end,
                    local_start: span_start - m.start,
                    local_end: span_end - m.start,
                    fragment_len: m.len(),
                }
            })
            .collect()
    }
}

/// The part of one fragment covered by a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSpan {
    pub fragment_index: usize,
    /// Range in the reconstructed unit string
    pub start: usize,
    pub end: usize,
    /// Same range, relative to the fragment's own text
    pub local_start: usize,
    pub local_end: usize,
    pub fragment_len: usize,
}

impl FragmentSpan {
    pub fn covers_whole_fragment(&self) -> bool {
        self.local_start == 0 && self.local_end == self.fragment_len
    }
}

/// A single search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub query: String,
    pub unit_index: usize,
    pub char_offset: usize,
    pub excerpt: String,
    /// 0-based rank among matches in the same unit
    pub occurrence_in_unit: usize,
    pub fragment_spans: Vec<FragmentSpan>,
}

impl SearchMatch {
    pub fn len(&self) -> usize {
        self.query.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn end(&self) -> usize {
        self.char_offset + self.len()
    }
}

/// Render-independent position in a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Locator {
    /// Page-relative character offset (survives resize and zoom)
    #[serde(rename_all = "camelCase")]
    Page { page_index: usize, char_offset: usize },
    /// Opaque flow-position string (survives re-pagination)
    Flow { cfi: String },
}

impl Locator {
    pub fn page(page_index: usize, char_offset: usize) -> Self {
        Locator::Page {
            page_index,
            char_offset,
        }
    }

    pub fn flow(cfi: impl Into<String>) -> Self {
        Locator::Flow { cfi: cfi.into() }
    }

    pub fn as_cfi(&self) -> Option<&str> {
        match self {
            Locator::Flow { cfi } => Some(cfi),
            Locator::Page { .. } => None,
        }
    }
}

/// A persisted highlight, owned by the external notes store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRecord {
    /// Join key to the note store
    pub id: String,
    pub text_content: String,
    pub created_at: DateTime<Utc>,
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl HighlightRecord {
    pub fn new(text_content: impl Into<String>, locator: Locator) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text_content: text_content.into(),
            created_at: Utc::now(),
            locator,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn to_blob(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_blob(blob: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(blob)?)
    }
}

/// Where read-aloud should begin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPoint {
    pub locator: Locator,
    /// Set when the offset was estimated from click geometry
    pub approximate: bool,
}

/// What an overlay represents; each kind is cleared independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    SearchMatch,
    Highlight,
}

/// Result of one navigate/resolve/draw/scroll pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOutcome {
    pub match_index: usize,
    pub unit_index: usize,
    /// Resolved position, when resolution succeeded
    pub locator: Option<Locator>,
    pub overlays_drawn: usize,
}

impl NavigationOutcome {
    pub fn unresolved(match_index: usize, unit_index: usize) -> Self {
        Self {
            match_index,
            unit_index,
            locator: None,
            overlays_drawn: 0,
        }
    }

    pub fn highlighted(&self) -> bool {
        self.overlays_drawn > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> ReconstructedUnitText {
        // "Hello World" from fragments 2 ("Hello") and 0 ("World")
        ReconstructedUnitText {
            unit_index: 0,
            text: "Hello World".to_string(),
            mappings: vec![
                FragmentMapping {
                    fragment_index: 2,
                    start: 0,
                    end: 5,
                },
                FragmentMapping {
                    fragment_index: 0,
                    start: 6,
                    end: 11,
                },
            ],
        }
    }

    #[test]
    fn test_spans_for_range_clips_to_overlap() {
        let spans = unit().spans_for_range(3, 8);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].fragment_index, spans[0].start, spans[0].end), (2, 3, 5));
        assert_eq!((spans[0].local_start, spans[0].local_end), (3, 5));
        assert_eq!((spans[1].fragment_index, spans[1].local_start, spans[1].local_end), (0, 0, 2));
        assert!(!spans[1].covers_whole_fragment());
    }

    #[test]
    fn test_spans_skip_separator_only_range() {
        assert!(unit().spans_for_range(5, 6).is_empty());
    }

    #[test]
    fn test_slice_is_char_based() {
        let text = ReconstructedUnitText {
            unit_index: 0,
            text: "Café au lait".to_string(),
            mappings: Vec::new(),
        };
        assert_eq!(text.slice(3, 7), "é au");
        assert_eq!(text.char_len(), 12);
    }

    #[test]
    fn test_rect_relative_to_container() {
        let container = Rect::new(10.0, 200.0, 600.0, 800.0);
        let rect = Rect::new(50.0, 260.0, 30.0, 12.0).relative_to(&container);
        assert_eq!(rect, Rect::new(40.0, 60.0, 30.0, 12.0));
    }

    #[test]
    fn test_locator_serialization() {
        let json = serde_json::to_string(&Locator::page(3, 120)).unwrap();
        assert_eq!(json, r#"{"type":"page","pageIndex":3,"charOffset":120}"#);

        let flow: Locator = serde_json::from_str(r#"{"type":"flow","cfi":"epubcfi(/6/4!/4/2/1:0)"}"#).unwrap();
        assert_eq!(flow.as_cfi(), Some("epubcfi(/6/4!/4/2/1:0)"));
    }

    #[test]
    fn test_highlight_blob_roundtrip() {
        let record = HighlightRecord::new("quoted text", Locator::flow("epubcfi(/6/2!/4/2,/1:0,/1:6)"))
            .with_color("yellow");
        let restored = HighlightRecord::from_blob(&record.to_blob().unwrap()).unwrap();
        assert_eq!(restored, record);
    }
}
