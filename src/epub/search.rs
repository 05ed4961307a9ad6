//! Flowed search session
//!
//! Sections are loaded out of band, walked and searched without rendering
//! them. A match keeps only its section and occurrence rank; the flow
//! position is computed at navigation time against the rendered section,
//! which may have been re-parsed by the renderer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;

use super::renderer::{FlowAnnotation, FlowRenderer, FlowTarget, TextRange};
use super::walker::{section_text, walk_section, TextNode};
use crate::config::EngineConfig;
use crate::document::{Locator, NavigationOutcome, OverlayKind, ReconstructedUnitText, SearchMatch};
use crate::error::{EngineError, Result};
use crate::text::{MatchFinder, UnitCache};

#[derive(Clone)]
pub struct EpubSearchSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    renderer: RwLock<Arc<dyn FlowRenderer>>,
    finder: MatchFinder,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    epoch: AtomicU64,
    navigation: AsyncMutex<()>,
}

struct SessionState {
    sections: UnitCache<Arc<Vec<TextNode>>>,
    failed_sections: Vec<usize>,
    query: Option<String>,
    matches: Vec<SearchMatch>,
    capped_units: Vec<usize>,
    current: Option<usize>,
    /// Flow position of the search-match annotation currently shown
    active_annotation: Option<String>,
}

impl EpubSearchSession {
    pub fn new(renderer: Arc<dyn FlowRenderer>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                renderer: RwLock::new(renderer),
                finder: MatchFinder::new(config.search.clone()),
                state: Mutex::new(SessionState {
                    sections: UnitCache::new(config.cache.max_sections),
                    failed_sections: Vec::new(),
                    query: None,
                    matches: Vec::new(),
                    capped_units: Vec::new(),
                    current: None,
                    active_annotation: None,
                }),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                navigation: AsyncMutex::new(()),
            }),
        }
    }

    pub fn renderer(&self) -> Arc<dyn FlowRenderer> {
        self.inner.renderer.read().clone()
    }

    fn is_current(&self, generation: u64, epoch: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
            && self.inner.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Section text from the cache, loading and walking it on a miss
    async fn section(&self, renderer: &dyn FlowRenderer, section: usize) -> Result<ReconstructedUnitText> {
        let cached = self.inner.state.lock().sections.get(section);
        if let Some(entry) = cached {
            return Ok(entry.text);
        }

        let markup = renderer.load_section(section).await?;
        let nodes = walk_section(&markup)?;
        let text = section_text(section, &nodes);
        self.inner
            .state
            .lock()
            .sections
            .insert(section, Arc::new(nodes), text.clone());
        Ok(text)
    }

    // ========== Search ==========

    /// Search every section and replace the result set.
    ///
    /// Sections are processed one at a time. A newer `search`, `clear` or
    /// document change supersedes this one: its partial results are dropped
    /// and it reports zero. Sections that fail to load are skipped.
    pub async fn search(&self, query: &str) -> Result<usize> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let renderer = self.renderer();

        let mut units = Vec::new();
        let mut failed = Vec::new();
        if self.inner.finder.accepts(query) {
            for section in 0..renderer.section_count() {
                if !self.is_current(generation, epoch) {
                    tracing::debug!(query, "Search superseded, discarding partial results");
                    return Ok(0);
                }
                match self.section(renderer.as_ref(), section).await {
                    Ok(text) => units.push(text),
                    Err(err) => {
                        tracing::warn!(section, error = %err, "Skipping section, text extraction failed");
                        failed.push(section);
                    }
                }
            }
        }

        let outcome = self.inner.finder.find(&units, query);
        let total = outcome.matches.len();

        let previous = {
            let mut state = self.inner.state.lock();
            if !self.is_current(generation, epoch) {
                tracing::debug!(query, "Search superseded, discarding results");
                return Ok(0);
            }
            state.query = Some(query.to_string());
            state.matches = outcome.matches;
            state.capped_units = outcome.capped_units;
            state.failed_sections = failed;
            state.current = None;
            state.active_annotation.take()
        };

        if let Some(cfi) = previous {
            renderer.remove_annotation(OverlayKind::SearchMatch, &cfi);
        }
        tracing::info!(query, matches = total, "Search complete");
        Ok(total)
    }

    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let previous = {
            let mut state = self.inner.state.lock();
            state.query = None;
            state.matches.clear();
            state.capped_units.clear();
            state.current = None;
            state.active_annotation.take()
        };
        if let Some(cfi) = previous {
            self.renderer().remove_annotation(OverlayKind::SearchMatch, &cfi);
        }
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

    pub fn capped_units(&self) -> Vec<usize> {
        self.inner.state.lock().capped_units.clone()
    }

    /// Sections skipped by the last search
    pub fn failed_sections(&self) -> Vec<usize> {
        self.inner.state.lock().failed_sections.clone()
    }

    // ========== Navigation ==========

    /// Display the match's section, resolve its exact flow position, land on
    /// it and annotate it.
    ///
    /// Any failure after the index moves leaves an outcome without a locator
    /// and without an annotation.
    pub async fn navigate_to_match(&self, index: usize) -> Result<NavigationOutcome> {
        let _pipeline = self.inner.navigation.lock().await;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        let search_match = {
            let mut state = self.inner.state.lock();
            let search_match = state
                .matches
                .get(index)
                .cloned()
                .ok_or(EngineError::MatchNotFound(index))?;
            state.current = Some(index);
            search_match
        };

        let section = search_match.unit_index;
        let renderer = self.renderer();
        let mut outcome = NavigationOutcome::unresolved(index, section);

        // The old match is gone from view whatever happens next
        let previous = self.inner.state.lock().active_annotation.take();
        if let Some(previous) = previous {
            renderer.remove_annotation(OverlayKind::SearchMatch, &previous);
        }

        if let Err(err) = renderer.display(&FlowTarget::Section(section)).await {
            tracing::warn!(section, error = %err, "Could not display section");
            return Ok(outcome);
        }
        if !self.is_current(generation, epoch) {
            return Ok(outcome);
        }

        let cfi = match self.resolve_occurrence(renderer.as_ref(), &search_match) {
            Ok(cfi) => cfi,
            Err(err) => {
                tracing::warn!(section, match_index = index, error = %err, "Could not resolve match");
                return Ok(outcome);
            }
        };

        if let Err(err) = renderer.display(&FlowTarget::Cfi(cfi.clone())).await {
            tracing::warn!(section, %cfi, error = %err, "Could not display match position");
        }
        if !self.is_current(generation, epoch) {
            return Ok(outcome);
        }

        self.inner.state.lock().active_annotation = Some(cfi.clone());
        renderer.add_annotation(&FlowAnnotation::search_match(cfi.clone()));

        outcome.locator = Some(Locator::flow(cfi));
        outcome.overlays_drawn = 1;
        Ok(outcome)
    }

    /// Re-find the match's occurrence in the rendered section and convert it
    /// to a flow position. Best effort if the document changed since search.
    fn resolve_occurrence(&self, renderer: &dyn FlowRenderer, search_match: &SearchMatch) -> Result<String> {
        let section = search_match.unit_index;
        let markup = renderer
            .rendered_document(section)
            .ok_or_else(|| EngineError::Resolution(format!("section {} is not rendered", section)))?;
        let nodes = walk_section(&markup)?;
        let text = section_text(section, &nodes);

        let (matches, _) = self.inner.finder.find_in_unit(&text, &search_match.query);
        let found = matches.get(search_match.occurrence_in_unit).ok_or_else(|| {
            EngineError::Resolution(format!(
                "occurrence {} of {:?} not in rendered section {}",
                search_match.occurrence_in_unit, search_match.query, section
            ))
        })?;

        let (Some(first), Some(last)) = (found.fragment_spans.first(), found.fragment_spans.last()) else {
            return Err(EngineError::Resolution("match covers no text node".to_string()));
        };
        let range = TextRange {
            start_node: first.fragment_index,
            start_offset: first.local_start,
            end_node: last.fragment_index,
            end_offset: last.local_end,
        };

        renderer.range_to_cfi(section, &range).ok_or_else(|| {
            EngineError::LocatorConversion(format!("renderer returned no position for {:?}", range))
        })
    }

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

    /// Discard caches and results, and sweep overlays left on the renderer
    pub fn close(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear();
        {
            let mut state = self.inner.state.lock();
            state.sections.clear();
            state.failed_sections.clear();
        }
        let swept = self.renderer().sweep_orphaned_overlays();
        tracing::debug!(swept, "Search session closed");
    }

    pub fn replace_document(&self, renderer: Arc<dyn FlowRenderer>) {
        self.close();
        *self.inner.renderer.write() = renderer;
        tracing::info!("Document replaced");
    }
}
