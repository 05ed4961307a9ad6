//! Page renderer interface
//!
//! The engine never draws pages itself. It asks a renderer for text content,
//! page changes, on-screen geometry and overlay drawing through this trait.

use async_trait::async_trait;
use tokio::time::sleep;

use super::types::{
    OverlayRect, PageSelection, PageTextContent, RenderSignal, RenderedTextElement, ScrollTarget,
};
use crate::config::RenderConfig;
use crate::document::{OverlayKind, Rect};
use crate::error::{EngineError, Result};

/// Paginated document renderer (e.g. a PDF viewer with a text layer)
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Number of pages in the open document
    fn page_count(&self) -> usize;

    /// Raw text items for a page, in the renderer's original order
    async fn text_content(&self, page_index: usize) -> Result<PageTextContent>;

    /// Page currently shown, if any
    fn current_page(&self) -> Option<usize>;

    /// Request a page change
    async fn go_to_page(&self, page_index: usize) -> Result<RenderSignal>;

    /// Whether the page and its text layer are fully rendered
    fn is_page_rendered(&self, page_index: usize) -> bool;

    /// Text elements currently laid out for a page, in creation order
    fn text_elements(&self, page_index: usize) -> Vec<RenderedTextElement>;

    /// Page container bounds in viewport coordinates
    fn page_container_rect(&self, page_index: usize) -> Option<Rect>;

    /// Exact viewport rect of a char sub-range of one text element
    fn sub_range_rect(
        &self,
        page_index: usize,
        element_index: usize,
        start: usize,
        end: usize,
    ) -> Option<Rect>;

    /// Remove every overlay of this kind, whatever page it sits on
    fn clear_overlays(&self, kind: OverlayKind);

    /// Draw overlays; rects are relative to their page container
    fn draw_overlays(&self, overlays: &[OverlayRect]);

    fn scroll_to(&self, target: &ScrollTarget);

    /// Current text selection, if the renderer tracks one
    fn current_selection(&self) -> Option<PageSelection> {
        None
    }
}

/// Make sure `page_index` is on screen and rendered.
///
/// Uses the renderer's completion signal when it gives one and falls back to
/// bounded polling otherwise.
pub async fn ensure_page_rendered(
    renderer: &dyn PageRenderer,
    page_index: usize,
    config: &RenderConfig,
) -> Result<()> {
    if page_index >= renderer.page_count() {
        return Err(EngineError::UnitNotFound(page_index));
    }
    if renderer.current_page() == Some(page_index) && renderer.is_page_rendered(page_index) {
        return Ok(());
    }

    match renderer.go_to_page(page_index).await? {
        RenderSignal::Rendered => Ok(()),
        RenderSignal::Pending => wait_for_render(renderer, page_index, config).await,
    }
}

async fn wait_for_render(
    renderer: &dyn PageRenderer,
    page_index: usize,
    config: &RenderConfig,
) -> Result<()> {
    for attempt in 0..config.poll_attempts {
        if renderer.is_page_rendered(page_index) {
            tracing::debug!(page = page_index, attempt, "Page rendered");
            return Ok(());
        }
        sleep(config.poll_interval()).await;
    }

    if renderer.is_page_rendered(page_index) {
        return Ok(());
    }
    Err(EngineError::RenderTimeout {
        unit: page_index,
        attempts: config.poll_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPageRenderer;
    use crate::pdf::TextFragment;

    fn renderer() -> HeadlessPageRenderer {
        let page = |i: usize| PageTextContent {
            page_index: i,
            width: 612.0,
            height: 792.0,
            items: vec![TextFragment::new(format!("page {}", i), 72.0, 700.0, 40.0, 12.0)],
        };
        HeadlessPageRenderer::new(vec![page(0), page(1)])
    }

    fn fast_polling(attempts: u32) -> RenderConfig {
        RenderConfig {
            poll_attempts: attempts,
            poll_interval_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_immediate_render_signal() {
        let renderer = renderer();
        ensure_page_rendered(&renderer, 1, &fast_polling(3)).await.unwrap();
        assert_eq!(renderer.current_page(), Some(1));
    }

    #[tokio::test]
    async fn test_polls_until_rendered() {
        let renderer = renderer().with_render_lag(4);
        ensure_page_rendered(&renderer, 1, &fast_polling(10)).await.unwrap();
        assert!(renderer.is_page_rendered(1));
    }

    #[tokio::test]
    async fn test_poll_ceiling_times_out() {
        let renderer = renderer().with_render_lag(100);
        let err = ensure_page_rendered(&renderer, 1, &fast_polling(3)).await.unwrap_err();
        assert!(matches!(err, EngineError::RenderTimeout { unit: 1, attempts: 3 }));
    }

    #[tokio::test]
    async fn test_out_of_range_page() {
        let renderer = renderer();
        let err = ensure_page_rendered(&renderer, 7, &fast_polling(3)).await.unwrap_err();
        assert!(matches!(err, EngineError::UnitNotFound(7)));
    }
}
