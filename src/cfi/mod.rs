//! Flow positions (EPUB CFI)
//!
//! Locators for reflowable content. A CFI addresses a text node by its path
//! of child indices, so it survives font-size changes and re-pagination:
//!
//! ```text
//! epubcfi(/6/4!/4/2/1:42)
//!         │  │ │ │ │ │ └── char offset 42
//!         │  │ │ │ │ └──── first text run (odd = text)
//!         │  │ │ │ └────── first element child of body
//!         │  │ │ └──────── body (second element of html)
//!         │  │ └────────── into the content document
//!         │  └──────────── spine item 1
//!         └─────────────── spine
//! ```

mod comparator;
mod generator;
mod parser;
mod types;

pub use comparator::{
    cmp_paths, cmp_reading_order, compare_cfi_strings, is_before, is_in_range,
    sort_by_reading_order,
};
pub use generator::{element_step, flow_range, text_step, CfiBuilder};
pub use parser::{parse, try_parse, CfiParseError};
pub use types::{Cfi, CfiPath, CfiRange, CfiStep, SPINE_STEP};
