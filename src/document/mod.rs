//! Format-agnostic document model
//!
//! Types shared by both engine halves: reconstructed unit text and its
//! fragment map, search matches, locators, persisted highlight records and
//! overlay bookkeeping.
//!
//! ```text
//!   fragments ──► ReconstructedUnitText ──► SearchMatch ──► Locator + overlay
//!   (per unit)     (text + FragmentMapping)  (spans)         (current render)
//! ```

mod types;

pub use types::{
    FragmentMapping, FragmentSpan, HighlightRecord, Locator, NavigationOutcome,
    OverlayKind, Point, ReconstructedUnitText, Rect, SearchMatch, StartPoint,
};
