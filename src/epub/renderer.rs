//! Flow renderer interface
//!
//! Reflowable content is laid out by the renderer (e.g. an EPUB viewer).
//! The engine loads section markup out of band, asks for range-to-CFI
//! conversion on rendered sections and delegates drawing to the renderer's
//! annotation system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::document::OverlayKind;
use crate::error::Result;

/// What to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FlowTarget {
    /// Start of a spine section
    Section(usize),
    /// Exact flow position
    Cfi(String),
}

/// A char range over a rendered section's text nodes.
///
/// Nodes are identified by their document-order ordinal, as produced by the
/// section walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub start_node: usize,
    pub start_offset: usize,
    pub end_node: usize,
    pub end_offset: usize,
}

/// The renderer's native text-selection event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEvent {
    pub cfi: String,
    pub text: String,
    pub section: usize,
}

/// A native annotation anchored at a flow position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAnnotation {
    pub kind: OverlayKind,
    pub cfi: String,
    /// Highlight id; empty for search matches
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl FlowAnnotation {
    pub fn search_match(cfi: impl Into<String>) -> Self {
        Self {
            kind: OverlayKind::SearchMatch,
            cfi: cfi.into(),
            id: String::new(),
            color: None,
        }
    }
}

/// Registered selection listener; events arrive on `events`
#[derive(Debug)]
pub struct SelectionSubscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<SelectionEvent>,
}

/// Reflowable document renderer
#[async_trait]
pub trait FlowRenderer: Send + Sync {
    /// Number of spine sections
    fn section_count(&self) -> usize;

    /// Section markup, loaded without rendering it
    async fn load_section(&self, section: usize) -> Result<String>;

    /// Display a target; resolves once it is rendered
    async fn display(&self, target: &FlowTarget) -> Result<()>;

    /// Markup of a section as currently rendered, `None` if not rendered
    fn rendered_document(&self, section: usize) -> Option<String>;

    /// Convert a range on a rendered section to a flow position
    fn range_to_cfi(&self, section: usize, range: &TextRange) -> Option<String>;

    fn add_annotation(&self, annotation: &FlowAnnotation);

    fn remove_annotation(&self, kind: OverlayKind, cfi: &str);

    /// Remove overlay elements left behind by a previous owner. Returns the
    /// number removed.
    fn sweep_orphaned_overlays(&self) -> usize;

    fn subscribe_selection(&self) -> SelectionSubscription;

    fn unsubscribe(&self, subscription_id: u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_target_serialization() {
        let json = serde_json::to_string(&FlowTarget::Section(3)).unwrap();
        assert_eq!(json, r#"{"type":"section","value":3}"#);
    }

    #[test]
    fn test_search_match_annotation() {
        let annotation = FlowAnnotation::search_match("epubcfi(/6/2!/4/2,/1:0,/1:4)");
        assert_eq!(annotation.kind, OverlayKind::SearchMatch);
        assert!(annotation.id.is_empty());
    }
}
