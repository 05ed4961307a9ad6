//! Persisted highlights on flowed content
//!
//! Highlights are anchored by flow position and drawn through the renderer's
//! annotation API. Every change (set, removal, visibility) removes all drawn
//! annotations and adds the visible set back in reading order.
//!
//! The selection subscription is registered at construction and removed by
//! `detach` (or on drop).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TryRecvError;

use super::renderer::{FlowAnnotation, FlowRenderer, SelectionEvent, SelectionSubscription};
use crate::cfi::{self, sort_by_reading_order, Cfi};
use crate::document::{HighlightRecord, Locator, OverlayKind, StartPoint};

pub struct EpubHighlighter {
    renderer: Arc<dyn FlowRenderer>,
    state: Mutex<HighlighterState>,
}

struct HighlighterState {
    subscription: Option<SelectionSubscription>,
    latest_selection: Option<SelectionEvent>,
    highlights: Vec<HighlightRecord>,
    visible: bool,
    /// Flow positions of the annotations currently added
    drawn: Vec<String>,
}

impl HighlighterState {
    /// Move queued selection events into the cache; the newest wins
    fn drain_selection_events(&mut self) {
        let Some(subscription) = self.subscription.as_mut() else {
            return;
        };
        loop {
            match subscription.events.try_recv() {
                Ok(event) => self.latest_selection = Some(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Selection stream closed by renderer");
                    break;
                }
            }
        }
    }
}

impl EpubHighlighter {
    pub fn new(renderer: Arc<dyn FlowRenderer>) -> Self {
        let subscription = renderer.subscribe_selection();
        tracing::debug!(subscription = subscription.id, "Subscribed to selection events");

        Self {
            renderer,
            state: Mutex::new(HighlighterState {
                subscription: Some(subscription),
                latest_selection: None,
                highlights: Vec::new(),
                visible: true,
                drawn: Vec::new(),
            }),
        }
    }

    /// Consume the most recent selection as a new highlight record.
    ///
    /// `None` when there is no selection (e.g. the user tapped elsewhere
    /// first). The record is not drawn until it comes back through
    /// `render_highlights`.
    pub fn create_highlight_from_selection(&self) -> Option<HighlightRecord> {
        let selection = {
            let mut state = self.state.lock();
            state.drain_selection_events();
            state.latest_selection.take()?
        };
        if selection.text.trim().is_empty() {
            return None;
        }
        Some(HighlightRecord::new(selection.text, Locator::flow(selection.cfi)))
    }

    /// Start read-aloud at the beginning of the current selection, without
    /// consuming it
    pub fn start_point_from_selection(&self) -> Option<StartPoint> {
        let position = {
            let mut state = self.state.lock();
            state.drain_selection_events();
            state.latest_selection.as_ref()?.cfi.clone()
        };
        let start = match cfi::parse(&position) {
            Ok(parsed) => Cfi::point(parsed.start()).to_string(),
            Err(err) => {
                tracing::debug!(%position, error = %err, "Selection position not parseable, using as-is");
                position
            }
        };
        Some(StartPoint {
            locator: Locator::flow(start),
            approximate: false,
        })
    }

    /// Replace the highlight set and redraw. Returns active annotations.
    pub fn render_highlights(&self, highlights: &[HighlightRecord]) -> usize {
        let flowed: Vec<HighlightRecord> = highlights
            .iter()
            .filter(|h| h.locator.as_cfi().is_some())
            .cloned()
            .collect();
        if flowed.len() != highlights.len() {
            tracing::debug!(
                skipped = highlights.len() - flowed.len(),
                "Ignoring highlights without a flow locator"
            );
        }
        self.state.lock().highlights = flowed;
        self.redraw()
    }

    pub fn remove_highlight(&self, id: &str) -> usize {
        self.state.lock().highlights.retain(|h| h.id != id);
        self.redraw()
    }

    pub fn set_highlights_visible(&self, visible: bool) -> usize {
        self.state.lock().visible = visible;
        self.redraw()
    }

    pub fn highlights_visible(&self) -> bool {
        self.state.lock().visible
    }

    pub fn active_annotation_count(&self) -> usize {
        self.state.lock().drawn.len()
    }

    /// Remove all, then add all visible in reading order
    fn redraw(&self) -> usize {
        let mut state = self.state.lock();

        for cfi in state.drawn.drain(..) {
            self.renderer.remove_annotation(OverlayKind::Highlight, &cfi);
        }
        if !state.visible {
            return 0;
        }

        let mut ordered = state.highlights.clone();
        sort_by_reading_order(&mut ordered, |h| h.locator.as_cfi());

        for highlight in &ordered {
            let Some(cfi) = highlight.locator.as_cfi() else {
                continue;
            };
            self.renderer.add_annotation(&FlowAnnotation {
                kind: OverlayKind::Highlight,
                cfi: cfi.to_string(),
                id: highlight.id.clone(),
                color: highlight.color.clone(),
            });
            state.drawn.push(cfi.to_string());
        }
        state.drawn.len()
    }

    /// Unsubscribe from selection events and remove drawn highlights.
    /// Idempotent.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        if let Some(subscription) = state.subscription.take() {
            self.renderer.unsubscribe(subscription.id);
            tracing::debug!(subscription = subscription.id, "Unsubscribed from selection events");
        }
        for cfi in state.drawn.drain(..) {
            self.renderer.remove_annotation(OverlayKind::Highlight, &cfi);
        }
        state.latest_selection = None;
    }
}

impl Drop for EpubHighlighter {
    fn drop(&mut self) {
        self.detach();
    }
}
