//! Amnesia Reader Library
//!
//! In-document search, locators and highlights for the reader's PDF and EPUB
//! views. The engine owns text reconstruction, matching and locator
//! resolution; drawing and layout belong to a renderer behind a trait.
//!
//! # Modules
//!
//! - `document`: Format-agnostic text, match and locator types
//! - `text`: Unit text reconstruction, match finding and unit caching
//! - `pdf`: Paginated search sessions, overlay projection and highlights
//! - `epub`: Flowed search sessions, section walking and highlights
//! - `cfi`: EPUB CFI parsing, generation and reading-order comparison
//! - `notes`: Highlight persistence through an opaque note store
//! - `headless`: In-memory renderers for the CLI and tests

pub mod cfi;
pub mod config;
pub mod document;
pub mod epub;
pub mod error;
pub mod headless;
pub mod notes;
pub mod pdf;
pub mod text;

pub use error::{EngineError, Result};
