//! In-memory renderers
//!
//! Stand-ins for a real viewer: they lay out text deterministically, record
//! overlays and annotations, and can be told to lag, fail or drift. Used by
//! the CLI and by tests.

mod epub;
mod pdf;

pub use epub::HeadlessFlowRenderer;
pub use pdf::HeadlessPageRenderer;
