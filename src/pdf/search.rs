//! Paginated search session
//!
//! Owns the per-document page text cache, the current result set and the
//! navigate → resolve → draw → scroll pipeline. Cheap to clone; every clone
//! drives the same session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex};

use super::projector::{overlays_for, project_spans, scroll_to_primary};
use super::renderer::{ensure_page_rendered, PageRenderer};
use super::types::{PageTextContent, ScrollTarget};
use crate::config::EngineConfig;
use crate::document::{Locator, NavigationOutcome, OverlayKind, ReconstructedUnitText, SearchMatch};
use crate::error::{EngineError, Result};
use crate::text::{reconstruct_page, MatchFinder, UnitCache};

/// Whether every page's text is cached and searchable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Cold,
    Warming,
    Ready,
}

#[derive(Clone)]
pub struct PdfSearchSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    renderer: RwLock<Arc<dyn PageRenderer>>,
    config: EngineConfig,
    finder: MatchFinder,
    state: Mutex<SessionState>,
    /// Bumped by every search and clear; stale navigations stop drawing
    generation: AtomicU64,
    /// Bumped on document replacement; stale warm-ups stop caching
    epoch: AtomicU64,
    navigation: AsyncMutex<()>,
    cache_state: watch::Sender<CacheState>,
}

struct SessionState {
    cache: UnitCache<Arc<PageTextContent>>,
    failed_pages: Vec<usize>,
    query: Option<String>,
    matches: Vec<SearchMatch>,
    capped_units: Vec<usize>,
    current: Option<usize>,
}

impl SessionState {
    fn reset_results(&mut self) {
        self.query = None;
        self.matches.clear();
        self.capped_units.clear();
        self.current = None;
    }
}

impl PdfSearchSession {
    pub fn new(renderer: Arc<dyn PageRenderer>, config: EngineConfig) -> Self {
        let page_count = renderer.page_count();
        let (cache_state, _) = watch::channel(CacheState::Cold);

        Self {
            inner: Arc::new(SessionInner {
                renderer: RwLock::new(renderer),
                finder: MatchFinder::new(config.search.clone()),
                config,
                state: Mutex::new(SessionState {
                    cache: UnitCache::new(page_count),
                    failed_pages: Vec::new(),
                    query: None,
                    matches: Vec::new(),
                    capped_units: Vec::new(),
                    current: None,
                }),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                navigation: AsyncMutex::new(()),
                cache_state,
            }),
        }
    }

    pub fn renderer(&self) -> Arc<dyn PageRenderer> {
        self.inner.renderer.read().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ========== Text cache ==========

    /// Extract and reconstruct every page, then mark the session ready.
    ///
    /// Pages are processed sequentially. A page whose extraction fails is
    /// logged and left out of the index. Returns the number of cached pages.
    pub async fn warm_cache(&self) -> Result<usize> {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let renderer = self.renderer();
        let page_count = renderer.page_count();

        self.inner.cache_state.send_replace(CacheState::Warming);
        {
            let mut state = self.inner.state.lock();
            state.cache.resize(page_count);
            state.failed_pages.clear();
        }
        tracing::debug!(pages = page_count, "Warming page text cache");

        let mut cached = 0;
        for page_index in 0..page_count {
            if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!("Document replaced during warm-up, abandoning");
                return Ok(cached);
            }

            let already_cached = self.inner.state.lock().cache.contains(page_index);
            if already_cached {
                cached += 1;
                continue;
            }

            match renderer.text_content(page_index).await {
                Ok(mut content) => {
                    content.page_index = page_index;
                    let text = reconstruct_page(page_index, &content.items, &self.inner.config.layout);
                    let mut state = self.inner.state.lock();
                    if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                        return Ok(cached);
                    }
                    state.cache.insert(page_index, Arc::new(content), text);
                    cached += 1;
                }
                Err(err) => {
                    tracing::warn!(page = page_index, error = %err, "Skipping page, text extraction failed");
                    self.inner.state.lock().failed_pages.push(page_index);
                }
            }
        }

        if self.inner.epoch.load(Ordering::SeqCst) == epoch {
            self.inner.cache_state.send_replace(CacheState::Ready);
            tracing::info!(
                cached,
                failed = page_count - cached,
                "Page text cache ready"
            );
        }
        Ok(cached)
    }

    pub fn cache_state(&self) -> CacheState {
        *self.inner.cache_state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.cache_state() == CacheState::Ready
    }

    /// Watch cache state transitions
    pub fn subscribe_cache_state(&self) -> watch::Receiver<CacheState> {
        self.inner.cache_state.subscribe()
    }

    /// Resolve once the cache reaches `Ready`
    pub async fn wait_until_ready(&self) {
        let mut rx = self.inner.cache_state.subscribe();
        while *rx.borrow_and_update() != CacheState::Ready {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.inner.state.lock().failed_pages.clone()
    }

    pub fn reconstructed_text(&self, page_index: usize) -> Option<ReconstructedUnitText> {
        self.inner.state.lock().cache.peek_text(page_index).cloned()
    }

    pub fn page_content(&self, page_index: usize) -> Option<Arc<PageTextContent>> {
        self.inner
            .state
            .lock()
            .cache
            .get(page_index)
            .map(|entry| entry.source)
    }

    // ========== Search ==========

    /// Search every cached page and replace the current result set.
    ///
    /// Returns the match count. Refuses with `NotReady` until `warm_cache`
    /// has completed, so a partial index is never searched.
    pub async fn search(&self, query: &str) -> Result<usize> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let texts = self.inner.state.lock().cache.texts();
        let outcome = self.inner.finder.find(&texts, query);
        let total = outcome.matches.len();

        {
            let mut state = self.inner.state.lock();
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!(query, "Search superseded, discarding results");
                return Ok(state.matches.len());
            }
            state.query = Some(query.to_string());
            state.matches = outcome.matches;
            state.capped_units = outcome.capped_units;
            state.current = None;
        }

        self.renderer().clear_overlays(OverlayKind::SearchMatch);
        tracing::info!(query, matches = total, "Search complete");
        Ok(total)
    }

    /// Drop the result set and any drawn match overlays
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().reset_results();
        self.renderer().clear_overlays(OverlayKind::SearchMatch);
    }

    pub fn query(&self) -> Option<String> {
        self.inner.state.lock().query.clone()
    }

    pub fn matches(&self) -> Vec<SearchMatch> {
        self.inner.state.lock().matches.clone()
    }

    pub fn total_matches(&self) -> usize {
        self.inner.state.lock().matches.len()
    }

    pub fn current_match_index(&self) -> Option<usize> {
        self.inner.state.lock().current
    }

    pub fn current_match(&self) -> Option<SearchMatch> {
        let state = self.inner.state.lock();
        state.current.and_then(|i| state.matches.get(i).cloned())
    }

    /// Pages where the per-page match cap cut the scan short
    pub fn capped_units(&self) -> Vec<usize> {
        self.inner.state.lock().capped_units.clone()
    }

    // ========== Navigation ==========

    /// Render the match's page, draw its overlays and scroll to it.
    ///
    /// Navigations are serialized. Render and resolution failures still
    /// move the current index and scroll to the page; they show up as an
    /// outcome with no overlays, not as an error.
    pub async fn navigate_to_match(&self, index: usize) -> Result<NavigationOutcome> {
        let _pipeline = self.inner.navigation.lock().await;
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let (search_match, content) = {
            let mut state = self.inner.state.lock();
            let search_match = state
                .matches
                .get(index)
                .cloned()
                .ok_or(EngineError::MatchNotFound(index))?;
            state.current = Some(index);
            let content = state.cache.get(search_match.unit_index).map(|entry| entry.source);
            (search_match, content)
        };

        let page_index = search_match.unit_index;
        let renderer = self.renderer();
        let mut outcome = NavigationOutcome {
            match_index: index,
            unit_index: page_index,
            locator: Some(Locator::page(page_index, search_match.char_offset)),
            overlays_drawn: 0,
        };

        // The old match is gone from view whatever happens next
        renderer.clear_overlays(OverlayKind::SearchMatch);

        if let Err(err) = ensure_page_rendered(renderer.as_ref(), page_index, &self.inner.config.render).await {
            tracing::warn!(page = page_index, error = %err, "Page not rendered, skipping highlight");
            renderer.scroll_to(&ScrollTarget::Page { page_index });
            return Ok(outcome);
        }

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(match_index = index, "Result set changed during navigation, not drawing");
            return Ok(outcome);
        }

        let rects = match content {
            Some(content) => project_spans(renderer.as_ref(), &content, &search_match.fragment_spans)
                .unwrap_or_else(|err| {
                    tracing::warn!(page = page_index, error = %err, "Could not resolve match on rendered page");
                    Vec::new()
                }),
            None => {
                tracing::warn!(page = page_index, "No cached text for page");
                Vec::new()
            }
        };

        if !rects.is_empty() {
            renderer.draw_overlays(&overlays_for(OverlayKind::SearchMatch, page_index, &rects, None));
        }
        scroll_to_primary(renderer.as_ref(), page_index, &rects);

        outcome.overlays_drawn = rects.len();
        Ok(outcome)
    }

    /// Advance cyclically; the first call goes to match 0
    pub async fn next(&self) -> Result<Option<NavigationOutcome>> {
        let target = {
            let state = self.inner.state.lock();
            let total = state.matches.len();
            if total == 0 {
                return Ok(None);
            }
            state.current.map_or(0, |i| (i + 1) % total)
        };
        self.navigate_to_match(target).await.map(Some)
    }

    /// Step back cyclically; the first call goes to the last match
    pub async fn previous(&self) -> Result<Option<NavigationOutcome>> {
        let target = {
            let state = self.inner.state.lock();
            let total = state.matches.len();
            if total == 0 {
                return Ok(None);
            }
            state.current.map_or(total - 1, |i| (i + total - 1) % total)
        };
        self.navigate_to_match(target).await.map(Some)
    }

    // ========== Lifecycle ==========

    /// Discard caches, results and every overlay this session drew
    pub fn close(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock();
            state.reset_results();
            state.cache.clear();
            state.failed_pages.clear();
        }
        self.inner.cache_state.send_replace(CacheState::Cold);

        let renderer = self.renderer();
        renderer.clear_overlays(OverlayKind::SearchMatch);
        renderer.clear_overlays(OverlayKind::Highlight);
        tracing::debug!("Search session closed");
    }

    /// Swap in a new document; the session goes cold until re-warmed
    pub fn replace_document(&self, renderer: Arc<dyn PageRenderer>) {
        self.close();
        let page_count = renderer.page_count();
        *self.inner.renderer.write() = renderer;
        self.inner.state.lock().cache.resize(page_count);
        tracing::info!(pages = page_count, "Document replaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::headless::HeadlessPageRenderer;
    use crate::pdf::TextFragment;

    fn page(index: usize, lines: &[&str]) -> PageTextContent {
        let items = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let width = line.chars().count() as f32 * 6.0;
                TextFragment::new(*line, 72.0, 700.0 - i as f32 * 14.0, width, 12.0)
            })
            .collect();
        PageTextContent {
            page_index: index,
            width: 612.0,
            height: 792.0,
            items,
        }
    }

    fn pages() -> Vec<PageTextContent> {
        vec![
            page(0, &["The needle in the", "haystack"]),
            page(1, &["No match here"]),
            page(2, &["Another needle, and", "one more needle"]),
        ]
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            render: RenderConfig {
                poll_attempts: 20,
                poll_interval_ms: 1,
            },
            ..EngineConfig::default()
        }
    }

    async fn ready_session(renderer: Arc<HeadlessPageRenderer>) -> PdfSearchSession {
        let session = PdfSearchSession::new(renderer, fast_config());
        session.warm_cache().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_search_before_warm_is_not_ready() {
        let session = PdfSearchSession::new(Arc::new(HeadlessPageRenderer::new(pages())), fast_config());
        assert_eq!(session.cache_state(), CacheState::Cold);
        assert!(matches!(session.search("needle").await, Err(EngineError::NotReady)));
    }

    #[tokio::test]
    async fn test_search_orders_matches_globally() {
        let session = ready_session(Arc::new(HeadlessPageRenderer::new(pages()))).await;
        assert!(session.is_ready());

        let total = session.search("NEEDLE").await.unwrap();
        assert_eq!(total, 3);

        let order: Vec<(usize, usize)> = session
            .matches()
            .iter()
            .map(|m| (m.unit_index, m.char_offset))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);

        // Same query, unchanged document: identical order
        session.search("needle").await.unwrap();
        let again: Vec<(usize, usize)> = session
            .matches()
            .iter()
            .map(|m| (m.unit_index, m.char_offset))
            .collect();
        assert_eq!(order, again);
    }

    #[tokio::test]
    async fn test_short_query_yields_nothing() {
        let session = ready_session(Arc::new(HeadlessPageRenderer::new(pages()))).await;
        assert_eq!(session.search("n").await.unwrap(), 0);
        assert_eq!(session.search("").await.unwrap(), 0);
        assert!(session.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_is_cyclic() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()));
        let session = ready_session(renderer.clone()).await;
        let total = session.search("needle").await.unwrap();

        let first = session.next().await.unwrap().unwrap();
        assert_eq!(first.match_index, 0);
        for _ in 0..total {
            session.next().await.unwrap();
        }
        assert_eq!(session.current_match_index(), Some(0));
        assert_eq!(session.current_match().unwrap().unit_index, 0);
    }

    #[tokio::test]
    async fn test_previous_wraps_to_last() {
        let session = ready_session(Arc::new(HeadlessPageRenderer::new(pages()))).await;
        session.search("needle").await.unwrap();

        let outcome = session.previous().await.unwrap().unwrap();
        assert_eq!(outcome.match_index, 2);
        assert_eq!(outcome.unit_index, 2);
    }

    #[tokio::test]
    async fn test_navigation_draws_and_scrolls() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()));
        let session = ready_session(renderer.clone()).await;
        session.search("needle").await.unwrap();

        let outcome = session.navigate_to_match(1).await.unwrap();
        assert_eq!(outcome.unit_index, 2);
        assert_eq!(outcome.locator, Some(Locator::page(2, 8)));
        assert_eq!(outcome.overlays_drawn, 1);
        assert_eq!(renderer.current_page(), Some(2));

        let overlays = renderer.overlays(OverlayKind::SearchMatch);
        assert_eq!(overlays.len(), 1);
        assert!(matches!(renderer.last_scroll(), Some(ScrollTarget::Centre { page_index: 2, .. })));

        // Moving on clears the previous match's overlay first
        session.navigate_to_match(2).await.unwrap();
        assert_eq!(renderer.overlays(OverlayKind::SearchMatch).len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_match_still_advances_and_scrolls() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()));
        let session = ready_session(renderer.clone()).await;
        session.search("haystack").await.unwrap();
        renderer.override_elements(0, Vec::new());

        let outcome = session.next().await.unwrap().unwrap();
        assert!(!outcome.highlighted());
        assert_eq!(session.current_match_index(), Some(0));
        assert_eq!(renderer.last_scroll(), Some(ScrollTarget::Page { page_index: 0 }));
    }

    #[tokio::test]
    async fn test_render_timeout_is_soft() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()).with_render_lag(1_000));
        let session = ready_session(renderer.clone()).await;
        session.search("needle").await.unwrap();

        let outcome = session.navigate_to_match(0).await.unwrap();
        assert_eq!(outcome.overlays_drawn, 0);
        assert_eq!(renderer.last_scroll(), Some(ScrollTarget::Page { page_index: 0 }));
    }

    #[tokio::test]
    async fn test_failed_navigation_leaves_no_stale_overlay() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()).with_render_lag(5));
        let config = EngineConfig {
            render: RenderConfig {
                poll_attempts: 2,
                poll_interval_ms: 1,
            },
            ..EngineConfig::default()
        };
        let session = PdfSearchSession::new(renderer.clone(), config);
        session.warm_cache().await.unwrap();
        session.search("needle").await.unwrap();

        // Page 0 is already up and settled
        renderer.go_to_page(0).await.unwrap();
        while !renderer.is_page_rendered(0) {}
        assert_eq!(session.navigate_to_match(0).await.unwrap().overlays_drawn, 1);

        // Page 2 never finishes rendering within the poll ceiling
        let outcome = session.navigate_to_match(1).await.unwrap();
        assert_eq!(outcome.overlays_drawn, 0);
        assert_eq!(session.current_match_index(), Some(1));
        assert!(renderer.overlays(OverlayKind::SearchMatch).is_empty());
        assert_eq!(renderer.last_scroll(), Some(ScrollTarget::Page { page_index: 2 }));
    }

    #[tokio::test]
    async fn test_navigations_run_one_at_a_time() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()).with_render_lag(5));
        let session = ready_session(renderer.clone()).await;
        session.search("needle").await.unwrap();

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.navigate_to_match(0).await })
        };
        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.navigate_to_match(1).await })
        };
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.overlays_drawn, 1);
        assert_eq!(second.overlays_drawn, 1);

        // Only the later navigation's overlay survives
        let overlays = renderer.overlays(OverlayKind::SearchMatch);
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].page_index, 2);
        assert_eq!(renderer.current_page(), Some(2));
        assert!(matches!(renderer.last_scroll(), Some(ScrollTarget::Centre { page_index: 2, .. })));
        assert_eq!(session.current_match_index(), Some(1));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_page() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()));
        renderer.fail_page(2);
        let session = ready_session(renderer).await;

        assert!(session.is_ready());
        assert_eq!(session.failed_pages(), vec![2]);
        assert_eq!(session.search("needle").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_per_page_cap_is_reported() {
        let dense = "e".repeat(250);
        let renderer = Arc::new(HeadlessPageRenderer::new(vec![page(0, &[dense.as_str()])]));
        let session = ready_session(renderer).await;

        assert_eq!(session.search("ee").await.unwrap(), 125);
        assert!(session.capped_units().is_empty());

        let longer = "e".repeat(500);
        let renderer = Arc::new(HeadlessPageRenderer::new(vec![page(0, &[longer.as_str()])]));
        session.replace_document(renderer);
        session.warm_cache().await.unwrap();
        assert_eq!(session.search("ee").await.unwrap(), 200);
        assert_eq!(session.capped_units(), vec![0]);
    }

    #[tokio::test]
    async fn test_clear_during_navigation_abandons_draw() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()).with_render_lag(5));
        let session = ready_session(renderer.clone()).await;
        session.search("needle").await.unwrap();

        let navigating = {
            let session = session.clone();
            tokio::spawn(async move { session.navigate_to_match(1).await })
        };
        tokio::task::yield_now().await;
        session.clear();

        let outcome = navigating.await.unwrap().unwrap();
        assert_eq!(outcome.overlays_drawn, 0);
        assert!(renderer.overlays(OverlayKind::SearchMatch).is_empty());
        assert_eq!(session.total_matches(), 0);
    }

    #[tokio::test]
    async fn test_close_resets_everything() {
        let renderer = Arc::new(HeadlessPageRenderer::new(pages()));
        let session = ready_session(renderer.clone()).await;
        session.search("needle").await.unwrap();
        session.next().await.unwrap();

        session.close();
        assert_eq!(session.cache_state(), CacheState::Cold);
        assert_eq!(session.total_matches(), 0);
        assert!(session.reconstructed_text(0).is_none());
        assert!(renderer.overlays(OverlayKind::SearchMatch).is_empty());
        assert!(matches!(session.search("needle").await, Err(EngineError::NotReady)));
    }
}
