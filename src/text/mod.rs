//! Text reconstruction, caching and matching
//!
//! Layers two and three of the engine: merge a unit's raw fragments into a
//! search-friendly string with a fragment map, then find literal matches and
//! intersect them with that map.

mod cache;
mod finder;
mod reconstruct;

pub use cache::{CachedUnit, UnitCache};
pub use finder::{find_matches, FindOutcome, MatchFinder};
pub use reconstruct::{reconstruct_flow, reconstruct_page};
