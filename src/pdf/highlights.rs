//! Persisted highlights on paginated content
//!
//! Highlights are stored as page + char offset locators and drawn the same
//! way search matches are: re-resolved against the current text layer, never
//! diffed against what was drawn before.

use parking_lot::Mutex;

use super::projector::{overlays_for, project_spans};
use super::search::PdfSearchSession;
use crate::document::{HighlightRecord, Locator, OverlayKind};

pub struct PdfHighlighter {
    session: PdfSearchSession,
    state: Mutex<HighlighterState>,
}

struct HighlighterState {
    highlights: Vec<HighlightRecord>,
    visible: bool,
}

impl PdfHighlighter {
    /// Shares the session's text cache and renderer
    pub fn new(session: PdfSearchSession) -> Self {
        Self {
            session,
            state: Mutex::new(HighlighterState {
                highlights: Vec::new(),
                visible: true,
            }),
        }
    }

    /// Replace the highlight set and redraw it. Returns the overlay count.
    ///
    /// Records with a flow locator belong to the other engine half and are
    /// ignored.
    pub fn render_highlights(&self, highlights: &[HighlightRecord]) -> usize {
        let paged: Vec<HighlightRecord> = highlights
            .iter()
            .filter(|h| matches!(h.locator, Locator::Page { .. }))
            .cloned()
            .collect();
        if paged.len() != highlights.len() {
            tracing::debug!(
                skipped = highlights.len() - paged.len(),
                "Ignoring highlights without a page locator"
            );
        }
        self.state.lock().highlights = paged;
        self.refresh()
    }

    /// Forget one highlight and redraw the rest
    pub fn remove_highlight(&self, id: &str) -> usize {
        self.state.lock().highlights.retain(|h| h.id != id);
        self.refresh()
    }

    pub fn set_highlights_visible(&self, visible: bool) -> usize {
        self.state.lock().visible = visible;
        self.refresh()
    }

    pub fn highlights_visible(&self) -> bool {
        self.state.lock().visible
    }

    pub fn highlight_count(&self) -> usize {
        self.state.lock().highlights.len()
    }

    /// Clear every highlight overlay, then draw those on rendered pages.
    ///
    /// Call again after a page change; highlights on pages that are not
    /// rendered are skipped until then.
    pub fn refresh(&self) -> usize {
        let (highlights, visible) = {
            let state = self.state.lock();
            (state.highlights.clone(), state.visible)
        };

        let renderer = self.session.renderer();
        renderer.clear_overlays(OverlayKind::Highlight);
        if !visible {
            return 0;
        }

        let mut drawn = 0;
        for highlight in &highlights {
            let Locator::Page { page_index, char_offset } = highlight.locator else {
                continue;
            };
            if !renderer.is_page_rendered(page_index) {
                continue;
            }
            let (Some(text), Some(content)) = (
                self.session.reconstructed_text(page_index),
                self.session.page_content(page_index),
            ) else {
                tracing::debug!(page = page_index, id = %highlight.id, "No cached text for highlight page");
                continue;
            };

            let end = char_offset + highlight.text_content.chars().count();
            if text.slice(char_offset, end).to_lowercase() != highlight.text_content.to_lowercase() {
                tracing::warn!(
                    page = page_index,
                    id = %highlight.id,
                    "Highlight text no longer matches page text, drawing at stored offset"
                );
            }

            let spans = text.spans_for_range(char_offset, end);
            match project_spans(renderer.as_ref(), &content, &spans) {
                Ok(rects) if !rects.is_empty() => {
                    renderer.draw_overlays(&overlays_for(
                        OverlayKind::Highlight,
                        page_index,
                        &rects,
                        Some(&highlight.id),
                    ));
                    drawn += rects.len();
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(page = page_index, id = %highlight.id, error = %err, "Could not resolve highlight");
                }
            }
        }
        drawn
    }

    /// Turn the renderer's current selection into a highlight record.
    ///
    /// `None` when nothing is selected or the selection covers no text. The
    /// record is not added to the drawn set; persist it and pass it back
    /// through `render_highlights`.
    pub fn create_highlight_from_selection(&self) -> Option<HighlightRecord> {
        let selection = self.session.renderer().current_selection()?;
        let text = self.session.reconstructed_text(selection.page_index)?;
        let selected = text.slice(selection.start, selection.end);
        if selected.trim().is_empty() {
            return None;
        }
        Some(HighlightRecord::new(
            selected,
            Locator::page(selection.page_index, selection.start),
        ))
    }
}
