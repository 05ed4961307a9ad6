//! Engine error types
//!
//! Unified error handling for the search, locator and highlight engine.
//! Most failures are recovered locally (logged and skipped); the variants
//! below are what crosses module boundaries before that happens.

use thiserror::Error;

use crate::cfi::CfiParseError;

/// Unified engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unit (page/section) index out of range
    #[error("Unit not found: index {0}")]
    UnitNotFound(usize),

    /// Match index outside the current result set
    #[error("Match not found: index {0}")]
    MatchNotFound(usize),

    /// A unit's content could not be loaded or parsed
    #[error("Text extraction error: {0}")]
    Extraction(String),

    /// A match could not be re-mapped onto rendered content
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The renderer could not turn a range into a flow position
    #[error("Locator conversion failed: {0}")]
    LocatorConversion(String),

    /// Renderer never signalled completion
    #[error("Unit {unit} not rendered after {attempts} attempts")]
    RenderTimeout { unit: usize, attempts: u32 },

    /// Search requested before every unit was cached
    #[error("Search index not ready")]
    NotReady,

    /// Locator of the wrong kind or pointing nowhere
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// External notes store failure
    #[error("Note store error: {0}")]
    Store(String),

    /// CFI parse error
    #[error("CFI parse error: {0}")]
    Cfi(#[from] CfiParseError),

    /// Section document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this failure is one the engine recovers from by skipping work
    /// rather than surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::Extraction(_)
                | EngineError::Resolution(_)
                | EngineError::LocatorConversion(_)
                | EngineError::RenderTimeout { .. }
                | EngineError::Xml(_)
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::RenderTimeout {
            unit: 3,
            attempts: 50,
        };
        assert_eq!(err.to_string(), "Unit 3 not rendered after 50 attempts");
        assert_eq!(EngineError::NotReady.to_string(), "Search index not ready");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(EngineError::Extraction("bad page".into()).is_recoverable());
        assert!(EngineError::LocatorConversion("no range".into()).is_recoverable());
        assert!(!EngineError::NotReady.is_recoverable());
        assert!(!EngineError::UnitNotFound(9).is_recoverable());
    }

    #[test]
    fn test_cfi_error_conversion() {
        let err: EngineError = crate::cfi::parse("").unwrap_err().into();
        assert!(matches!(err, EngineError::Cfi(CfiParseError::Empty)));
    }
}
