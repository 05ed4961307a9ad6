//! In-memory flow renderer
//!
//! Holds section markup, tracks the displayed section, converts ranges with
//! the section walker and records annotations instead of drawing them.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::cfi::{self, flow_range};
use crate::document::OverlayKind;
use crate::epub::{
    section_text, walk_section, FlowAnnotation, FlowRenderer, FlowTarget, SelectionEvent,
    SelectionSubscription, TextRange,
};
use crate::error::{EngineError, Result};

pub struct HeadlessFlowRenderer {
    sections: Vec<String>,
    state: Mutex<FlowState>,
}

#[derive(Default)]
struct FlowState {
    displayed: Option<usize>,
    last_target: Option<FlowTarget>,
    rendered_overrides: HashMap<usize, String>,
    failing: HashSet<usize>,
    range_conversion_disabled: bool,
    annotations: Vec<FlowAnnotation>,
    orphans: usize,
    subscribers: HashMap<u64, mpsc::UnboundedSender<SelectionEvent>>,
    next_subscription: u64,
}

impl HeadlessFlowRenderer {
    pub fn new(sections: Vec<String>) -> Self {
        Self {
            sections,
            state: Mutex::new(FlowState::default()),
        }
    }

    /// Make loading a section fail
    pub fn fail_section(&self, section: usize) {
        self.state.lock().failing.insert(section);
    }

    /// Render different markup for a section than `load_section` returns
    pub fn override_rendered(&self, section: usize, markup: String) {
        self.state.lock().rendered_overrides.insert(section, markup);
    }

    pub fn disable_range_conversion(&self) {
        self.state.lock().range_conversion_disabled = true;
    }

    /// Pretend a previous owner left overlay elements behind
    pub fn leave_orphans(&self, count: usize) {
        self.state.lock().orphans = count;
    }

    pub fn orphan_count(&self) -> usize {
        self.state.lock().orphans
    }

    pub fn annotations(&self, kind: OverlayKind) -> Vec<FlowAnnotation> {
        self.state
            .lock()
            .annotations
            .iter()
            .filter(|annotation| annotation.kind == kind)
            .cloned()
            .collect()
    }

    pub fn last_target(&self) -> Option<FlowTarget> {
        self.state.lock().last_target.clone()
    }

    pub fn displayed_section(&self) -> Option<usize> {
        self.state.lock().displayed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Select the first occurrence of `needle` in the displayed section and
    /// notify subscribers. Returns the selection's flow position.
    pub fn select_text(&self, section: usize, needle: &str) -> Option<String> {
        let markup = self.rendered_document(section)?;
        let nodes = walk_section(&markup).ok()?;
        let text = section_text(section, &nodes);

        let byte_start = text.text.find(needle)?;
        let start = text.text[..byte_start].chars().count();
        let end = start + needle.chars().count();
        let spans = text.spans_for_range(start, end);
        let (first, last) = (spans.first()?, spans.last()?);

        let (start_node, end_node) = (nodes.get(first.fragment_index)?, nodes.get(last.fragment_index)?);
        let range = flow_range(
            section,
            &start_node.steps,
            start_node.cfi_offset(first.local_start),
            &end_node.steps,
            end_node.cfi_offset(last.local_end),
        )
        .to_string();

        let event = SelectionEvent {
            cfi: range.clone(),
            text: needle.to_string(),
            section,
        };
        let state = self.state.lock();
        for sender in state.subscribers.values() {
            // A dropped receiver is cleaned up on unsubscribe
            let _ = sender.send(event.clone());
        }
        Some(range)
    }

    fn section_for(&self, target: &FlowTarget) -> Result<usize> {
        let section = match target {
            FlowTarget::Section(section) => *section,
            FlowTarget::Cfi(position) => cfi::parse(position)
                .ok()
                .and_then(|parsed| parsed.spine_index())
                .ok_or_else(|| EngineError::InvalidLocator(position.clone()))?,
        };
        if section >= self.sections.len() {
            return Err(EngineError::UnitNotFound(section));
        }
        Ok(section)
    }
}

#[async_trait]
impl FlowRenderer for HeadlessFlowRenderer {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    async fn load_section(&self, section: usize) -> Result<String> {
        // Loading is I/O in a real renderer; let other tasks in
        tokio::task::yield_now().await;

        let markup = self
            .sections
            .get(section)
            .ok_or(EngineError::UnitNotFound(section))?;
        if self.state.lock().failing.contains(&section) {
            return Err(EngineError::Extraction(format!(
                "section {} could not be loaded",
                section
            )));
        }
        Ok(markup.clone())
    }

    async fn display(&self, target: &FlowTarget) -> Result<()> {
        let section = self.section_for(target)?;
        // Layout finishes on a later tick
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        state.displayed = Some(section);
        state.last_target = Some(target.clone());
        Ok(())
    }

    fn rendered_document(&self, section: usize) -> Option<String> {
        let state = self.state.lock();
        if state.displayed != Some(section) {
            return None;
        }
        state
            .rendered_overrides
            .get(&section)
            .or_else(|| self.sections.get(section))
            .cloned()
    }

    fn range_to_cfi(&self, section: usize, range: &TextRange) -> Option<String> {
        if self.state.lock().range_conversion_disabled {
            return None;
        }
        let markup = self.rendered_document(section)?;
        let nodes = walk_section(&markup).ok()?;
        let start = nodes.get(range.start_node)?;
        let end = nodes.get(range.end_node)?;
        Some(
            flow_range(
                section,
                &start.steps,
                start.cfi_offset(range.start_offset),
                &end.steps,
                end.cfi_offset(range.end_offset),
            )
            .to_string(),
        )
    }

    fn add_annotation(&self, annotation: &FlowAnnotation) {
        self.state.lock().annotations.push(annotation.clone());
    }

    fn remove_annotation(&self, kind: OverlayKind, cfi: &str) {
        self.state
            .lock()
            .annotations
            .retain(|annotation| !(annotation.kind == kind && annotation.cfi == cfi));
    }

    fn sweep_orphaned_overlays(&self) -> usize {
        std::mem::take(&mut self.state.lock().orphans)
    }

    fn subscribe_selection(&self) -> SelectionSubscription {
        let (sender, events) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscribers.insert(id, sender);
        SelectionSubscription { id, events }
    }

    fn unsubscribe(&self, subscription_id: u64) {
        self.state.lock().subscribers.remove(&subscription_id);
    }
}
