//! PDF data types
//!
//! Page text content as the renderer extracts it, the rendered text
//! elements it lays out on screen, and the overlays drawn on top.

use serde::{Deserialize, Serialize};

use crate::document::{OverlayKind, Rect};

/// Text content of a single page, in the renderer's original item order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTextContent {
    /// Page index (0-based)
    pub page_index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Text items, unsorted
    pub items: Vec<TextFragment>,
}

impl PageTextContent {
    /// Items the renderer actually draws an element for, with original indices
    pub fn visible_items(&self) -> impl Iterator<Item = (usize, &TextFragment)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.has_visible_text())
    }

    /// Mean item height, used as a line-height estimate
    pub fn mean_item_height(&self) -> Option<f32> {
        let heights: Vec<f32> = self
            .visible_items()
            .map(|(_, item)| item.height)
            .filter(|h| *h > 0.0)
            .collect();
        if heights.is_empty() {
            None
        } else {
            Some(heights.iter().sum::<f32>() / heights.len() as f32)
        }
    }
}

/// A positioned run of text on a page
///
/// Coordinates are PDF user space: origin bottom-left, `y` grows upward and
/// marks the baseline side of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFragment {
    /// The text content
    pub text: String,
    /// X position (in points, from left)
    pub x: f32,
    /// Y position (in points, from bottom)
    pub y: f32,
    /// Width of the text bounding box
    pub width: f32,
    /// Height of the text bounding box
    pub height: f32,
    /// Font identity as reported by the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            font_name: None,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Renderers skip drawing an element for empty or whitespace-only runs
    pub fn has_visible_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A text element as currently laid out on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTextElement {
    pub text: String,
    /// Viewport coordinates, origin top-left
    pub rect: Rect,
}

impl RenderedTextElement {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self {
            text: text.into(),
            rect,
        }
    }
}

/// What a page change request reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSignal {
    /// The page is fully rendered, text layer included
    Rendered,
    /// Rendering continues asynchronously; poll `is_page_rendered`
    Pending,
}

/// A drawn rectangle, relative to its page container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRect {
    pub kind: OverlayKind,
    pub page_index: usize,
    pub rect: Rect,
    /// Highlight id for persisted highlights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<String>,
}

/// Where to scroll after drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScrollTarget {
    /// Centre this rect (container-relative) of the given page
    #[serde(rename_all = "camelCase")]
    Centre { page_index: usize, rect: Rect },
    /// Bring the page container into view
    #[serde(rename_all = "camelCase")]
    Page { page_index: usize },
}

/// A user selection on a page, as reconstructed-text char offsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSelection {
    pub page_index: usize,
    pub start: usize,
    pub end: usize,
}
