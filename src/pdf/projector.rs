//! Highlight projection for paginated content
//!
//! Turns fragment spans into rectangles against the page as it is rendered
//! right now. Geometry is never cached between draws.

use super::correspond::correlate;
use super::renderer::PageRenderer;
use super::types::{OverlayRect, PageTextContent, ScrollTarget};
use crate::document::{FragmentSpan, OverlayKind, Rect};
use crate::error::{EngineError, Result};

/// Rects for `spans`, relative to the page container.
///
/// Spans whose element cannot be found, or whose sub-range has no geometry,
/// are skipped. An error means nothing on the page could be resolved.
pub fn project_spans(
    renderer: &dyn PageRenderer,
    content: &PageTextContent,
    spans: &[FragmentSpan],
) -> Result<Vec<Rect>> {
    let page_index = content.page_index;
    let container = renderer.page_container_rect(page_index).ok_or_else(|| {
        EngineError::Resolution(format!("page {} has no container", page_index))
    })?;

    let elements = renderer.text_elements(page_index);
    if elements.is_empty() {
        return Err(EngineError::Resolution(format!(
            "text layer for page {} is empty",
            page_index
        )));
    }

    let correspondence = correlate(&content.items, &elements);
    let mut rects = Vec::with_capacity(spans.len());

    for span in spans {
        let Some(element_index) = correspondence.element_for(span.fragment_index) else {
            tracing::debug!(
                page = page_index,
                fragment = span.fragment_index,
                "No rendered element for fragment"
            );
            continue;
        };
        let element = &elements[element_index];
        let element_len = element.text.chars().count();

        let rect = if span.local_start == 0 && span.local_end >= element_len {
            Some(element.rect)
        } else {
            renderer.sub_range_rect(page_index, element_index, span.local_start, span.local_end)
        };

        match rect {
            Some(rect) if !rect.is_empty() => rects.push(rect.relative_to(&container)),
            _ => tracing::debug!(
                page = page_index,
                element = element_index,
                "No geometry for span"
            ),
        }
    }

    Ok(rects)
}

/// Overlay records for a set of container-relative rects
pub fn overlays_for(
    kind: OverlayKind,
    page_index: usize,
    rects: &[Rect],
    highlight_id: Option<&str>,
) -> Vec<OverlayRect> {
    rects
        .iter()
        .map(|rect| OverlayRect {
            kind,
            page_index,
            rect: *rect,
            highlight_id: highlight_id.map(str::to_string),
        })
        .collect()
}

/// Centre the primary rect, or bring the page into view when there is none
pub fn scroll_to_primary(renderer: &dyn PageRenderer, page_index: usize, rects: &[Rect]) {
    let target = match rects.first() {
        Some(rect) => ScrollTarget::Centre {
            page_index,
            rect: *rect,
        },
        None => ScrollTarget::Page { page_index },
    };
    renderer.scroll_to(&target);
}
