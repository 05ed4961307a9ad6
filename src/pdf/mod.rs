//! Paginated (PDF) engine half
//!
//! Page text comes from the renderer as positioned fragments. Search runs
//! over the reconstructed page strings; matches and highlights are drawn by
//! re-joining fragment spans to the page's current text layer.
//!
//! ```text
//!   PageRenderer ──text_content──► reconstruct_page ──► UnitCache
//!        ▲                                                  │
//!        │ draw_overlays / scroll_to                 MatchFinder
//!        │                                                  │
//!   projector ◄── correspond (fragments ↔ elements) ◄── SearchMatch
//! ```

mod correspond;
mod highlights;
mod projector;
mod renderer;
mod search;
mod selection;
mod types;

pub use correspond::{correlate, Correspondence, CorrespondenceStrategy};
pub use highlights::PdfHighlighter;
pub use projector::project_spans;
pub use renderer::{ensure_page_rendered, PageRenderer};
pub use search::{CacheState, PdfSearchSession};
pub use selection::{approximate_char_offset, GlyphMetrics};
pub use types::{
    OverlayRect, PageSelection, PageTextContent, RenderSignal, RenderedTextElement, ScrollTarget,
    TextFragment,
};
