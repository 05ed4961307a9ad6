//! Flowed (EPUB) engine half
//!
//! Sections are searched as walked text-node streams. Navigation converts a
//! match into a flow position (CFI) on the rendered section, and all drawing
//! goes through the renderer's annotation API.

mod highlights;
mod renderer;
mod search;
mod walker;

pub use highlights::EpubHighlighter;
pub use renderer::{
    FlowAnnotation, FlowRenderer, FlowTarget, SelectionEvent, SelectionSubscription, TextRange,
};
pub use search::EpubSearchSession;
pub use walker::{section_text, walk_section, TextNode};
