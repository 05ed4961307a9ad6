//! "Start here" capture on paginated content
//!
//! A double-click or long-press is turned into a char offset by dividing the
//! click position by average glyph and line dimensions. This is an estimate,
//! not hit-testing: consumers (TTS start points) must tolerate being a few
//! characters off.

use super::search::PdfSearchSession;
use super::types::PageTextContent;
use crate::document::{Locator, Point, Rect, StartPoint};

/// Average glyph dimensions for a page, in viewport units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    pub char_width: f32,
    pub line_height: f32,
}

impl GlyphMetrics {
    /// Estimate from the page's text items, scaled from page points
    pub fn estimate(content: &PageTextContent, scale: f32) -> Option<Self> {
        let (width, chars) = content
            .visible_items()
            .fold((0.0f32, 0usize), |(w, n), (_, item)| {
                (w + item.width, n + item.text.chars().count())
            });
        if chars == 0 || width <= 0.0 {
            return None;
        }
        let line_height = content.mean_item_height()?;

        Some(Self {
            char_width: width / chars as f32 * scale,
            line_height: line_height * scale,
        })
    }
}

/// Estimate the char offset under `click` within a page's text layer.
///
/// Line index times chars-per-line plus column, clamped into
/// `[0, text_len]`.
pub fn approximate_char_offset(
    click: Point,
    text_layer: &Rect,
    metrics: &GlyphMetrics,
    text_len: usize,
) -> usize {
    if metrics.char_width <= 0.0 || metrics.line_height <= 0.0 {
        return 0;
    }

    let rel_x = (click.x - text_layer.x).clamp(0.0, text_layer.width.max(0.0));
    let rel_y = (click.y - text_layer.y).max(0.0);

    let chars_per_line = ((text_layer.width / metrics.char_width).floor() as usize).max(1);
    let line = (rel_y / metrics.line_height).floor() as usize;
    let column = ((rel_x / metrics.char_width).floor() as usize).min(chars_per_line - 1);

    line.saturating_mul(chars_per_line)
        .saturating_add(column)
        .min(text_len)
}

impl PdfSearchSession {
    /// TTS start point for a click on a page, or `None` if the page has no
    /// cached text or is not laid out.
    pub fn start_point_at(&self, page_index: usize, click: Point) -> Option<StartPoint> {
        let content = self.page_content(page_index)?;
        let text = self.reconstructed_text(page_index)?;
        let layer = self.renderer().page_container_rect(page_index)?;

        let scale = if content.width > 0.0 {
            layer.width / content.width
        } else {
            1.0
        };
        let metrics = GlyphMetrics::estimate(&content, scale)?;
        let offset = approximate_char_offset(click, &layer, &metrics, text.char_len());
        tracing::debug!(page = page_index, offset, "Approximated start point");

        Some(StartPoint {
            locator: Locator::page(page_index, offset),
            approximate: true,
        })
    }
}
