//! In-memory page renderer
//!
//! Pages are stacked vertically from viewport top 0. Each visible text item
//! gets one element whose box is the item's box flipped to top-left origin.
//! Sub-ranges are measured proportionally to char count.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::{OverlayKind, Rect};
use crate::error::{EngineError, Result};
use crate::pdf::{
    OverlayRect, PageRenderer, PageSelection, PageTextContent, RenderSignal, RenderedTextElement,
    ScrollTarget,
};

pub struct HeadlessPageRenderer {
    pages: Vec<PageTextContent>,
    /// `is_page_rendered` checks answered `false` after each page change
    render_lag: u32,
    state: Mutex<PageState>,
}

#[derive(Default)]
struct PageState {
    current: Option<usize>,
    pending_checks: u32,
    element_overrides: HashMap<usize, Vec<RenderedTextElement>>,
    failing: HashSet<usize>,
    overlays: Vec<OverlayRect>,
    last_scroll: Option<ScrollTarget>,
    selection: Option<PageSelection>,
}

impl HeadlessPageRenderer {
    pub fn new(pages: Vec<PageTextContent>) -> Self {
        Self {
            pages,
            render_lag: 0,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn with_render_lag(mut self, checks: u32) -> Self {
        self.render_lag = checks;
        self
    }

    /// Replace the laid-out text layer of a page
    pub fn override_elements(&self, page_index: usize, elements: Vec<RenderedTextElement>) {
        self.state.lock().element_overrides.insert(page_index, elements);
    }

    /// Make text extraction fail for a page
    pub fn fail_page(&self, page_index: usize) {
        self.state.lock().failing.insert(page_index);
    }

    pub fn select(&self, page_index: usize, start: usize, end: usize) {
        self.state.lock().selection = Some(PageSelection {
            page_index,
            start,
            end,
        });
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection = None;
    }

    pub fn overlays(&self, kind: OverlayKind) -> Vec<OverlayRect> {
        self.state
            .lock()
            .overlays
            .iter()
            .filter(|overlay| overlay.kind == kind)
            .cloned()
            .collect()
    }

    pub fn last_scroll(&self) -> Option<ScrollTarget> {
        self.state.lock().last_scroll.clone()
    }

    fn page_top(&self, page_index: usize) -> f32 {
        self.pages[..page_index].iter().map(|page| page.height).sum()
    }

    fn laid_out_elements(&self, page_index: usize) -> Vec<RenderedTextElement> {
        let Some(page) = self.pages.get(page_index) else {
            return Vec::new();
        };
        let top = self.page_top(page_index);
        page.visible_items()
            .map(|(_, item)| {
                let rect = Rect::new(
                    item.x,
                    top + page.height - (item.y + item.height),
                    item.width,
                    item.height,
                );
                RenderedTextElement::new(item.text.clone(), rect)
            })
            .collect()
    }
}

#[async_trait]
impl PageRenderer for HeadlessPageRenderer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn text_content(&self, page_index: usize) -> Result<PageTextContent> {
        let page = self
            .pages
            .get(page_index)
            .ok_or(EngineError::UnitNotFound(page_index))?;
        if self.state.lock().failing.contains(&page_index) {
            return Err(EngineError::Extraction(format!(
                "page {} has no readable text layer",
                page_index
            )));
        }
        Ok(page.clone())
    }

    fn current_page(&self) -> Option<usize> {
        self.state.lock().current
    }

    async fn go_to_page(&self, page_index: usize) -> Result<RenderSignal> {
        if page_index >= self.pages.len() {
            return Err(EngineError::UnitNotFound(page_index));
        }
        let mut state = self.state.lock();
        state.current = Some(page_index);
        state.pending_checks = self.render_lag;
        Ok(if self.render_lag == 0 {
            RenderSignal::Rendered
        } else {
            RenderSignal::Pending
        })
    }

    fn is_page_rendered(&self, page_index: usize) -> bool {
        let mut state = self.state.lock();
        if state.current != Some(page_index) {
            return false;
        }
        if state.pending_checks > 0 {
            state.pending_checks -= 1;
            return false;
        }
        true
    }

    fn text_elements(&self, page_index: usize) -> Vec<RenderedTextElement> {
        if let Some(elements) = self.state.lock().element_overrides.get(&page_index) {
            return elements.clone();
        }
        self.laid_out_elements(page_index)
    }

    fn page_container_rect(&self, page_index: usize) -> Option<Rect> {
        let page = self.pages.get(page_index)?;
        Some(Rect::new(
            0.0,
            self.page_top(page_index),
            page.width,
            page.height,
        ))
    }

    fn sub_range_rect(
        &self,
        page_index: usize,
        element_index: usize,
        start: usize,
        end: usize,
    ) -> Option<Rect> {
        let elements = self.text_elements(page_index);
        let element = elements.get(element_index)?;
        let len = element.text.chars().count();
        if len == 0 || start >= end || end > len {
            return None;
        }
        let char_width = element.rect.width / len as f32;
        Some(Rect::new(
            element.rect.x + char_width * start as f32,
            element.rect.y,
            char_width * (end - start) as f32,
            element.rect.height,
        ))
    }

    fn clear_overlays(&self, kind: OverlayKind) {
        self.state.lock().overlays.retain(|overlay| overlay.kind != kind);
    }

    fn draw_overlays(&self, overlays: &[OverlayRect]) {
        self.state.lock().overlays.extend_from_slice(overlays);
    }

    fn scroll_to(&self, target: &ScrollTarget) {
        self.state.lock().last_scroll = Some(target.clone());
    }

    fn current_selection(&self) -> Option<PageSelection> {
        self.state.lock().selection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::TextFragment;

    fn pages() -> Vec<PageTextContent> {
        (0..2)
            .map(|i| PageTextContent {
                page_index: i,
                width: 600.0,
                height: 800.0,
                items: vec![
                    TextFragment::new("Chapter", 100.0, 700.0, 70.0, 10.0),
                    TextFragment::new("  ", 170.0, 700.0, 6.0, 10.0),
                ],
            })
            .collect()
    }

    #[test]
    fn test_pages_stack_vertically() {
        let renderer = HeadlessPageRenderer::new(pages());
        assert_eq!(
            renderer.page_container_rect(1),
            Some(Rect::new(0.0, 800.0, 600.0, 800.0))
        );
        let elements = renderer.text_elements(1);
        // Whitespace-only items get no element
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].rect, Rect::new(100.0, 890.0, 70.0, 10.0));
        assert!(renderer.page_container_rect(2).is_none());
    }

    #[test]
    fn test_sub_range_is_proportional() {
        let renderer = HeadlessPageRenderer::new(pages());
        assert_eq!(
            renderer.sub_range_rect(0, 0, 3, 7),
            Some(Rect::new(130.0, 90.0, 40.0, 10.0))
        );
        assert!(renderer.sub_range_rect(0, 0, 3, 9).is_none());
        assert!(renderer.sub_range_rect(0, 1, 0, 1).is_none());
    }

    #[tokio::test]
    async fn test_render_lag_counts_down() {
        let renderer = HeadlessPageRenderer::new(pages()).with_render_lag(2);
        assert_eq!(renderer.go_to_page(1).await.unwrap(), RenderSignal::Pending);
        assert!(!renderer.is_page_rendered(1));
        assert!(!renderer.is_page_rendered(1));
        assert!(renderer.is_page_rendered(1));
        assert!(!renderer.is_page_rendered(0));
    }

    #[tokio::test]
    async fn test_failing_page() {
        let renderer = HeadlessPageRenderer::new(pages());
        renderer.fail_page(1);
        assert!(renderer.text_content(0).await.is_ok());
        assert!(matches!(
            renderer.text_content(1).await,
            Err(EngineError::Extraction(_))
        ));
        assert!(matches!(
            renderer.text_content(5).await,
            Err(EngineError::UnitNotFound(5))
        ));
    }
}
