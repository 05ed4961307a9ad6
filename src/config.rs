//! Configuration management for the reader engine
//!
//! Every threshold here was picked empirically; they are tunables, not
//! semantics. Only "small" matters for the layout values.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub search: SearchConfig,
    pub render: RenderConfig,
    pub cache: CacheConfig,
}

/// Text reconstruction thresholds (layout units)
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    /// Max vertical drift for two fragments to share a line
    pub line_tolerance: f32,
    /// Horizontal gap above which a space is inferred between fragments
    pub gap_threshold: f32,
    /// Character inserted between successive lines
    pub line_separator: char,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Shorter queries return no matches (product policy)
    pub min_query_chars: usize,
    /// Safety valve against degenerate pages
    pub max_matches_per_unit: usize,
    /// Characters of context on each side of an excerpt
    pub excerpt_context: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Poll ceiling when the renderer gives no completion signal
    pub poll_attempts: u32,
    /// Delay between polls, in milliseconds
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Parsed EPUB sections kept per session
    pub max_sections: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            gap_threshold: 2.0,
            line_separator: ' ',
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_chars: 2,
            max_matches_per_unit: 200,
            excerpt_context: 40,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 50,
            poll_interval_ms: 20,
        }
    }
}

impl RenderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_sections: 64 }
    }
}

impl EngineConfig {
    /// Load configuration from `AMNESIA_*` environment variables,
    /// falling back to defaults for anything missing or malformed.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            layout: LayoutConfig {
                line_tolerance: env_or("AMNESIA_LINE_TOLERANCE", defaults.layout.line_tolerance),
                gap_threshold: env_or("AMNESIA_GAP_THRESHOLD", defaults.layout.gap_threshold),
                line_separator: defaults.layout.line_separator,
            },
            search: SearchConfig {
                min_query_chars: env_or("AMNESIA_MIN_QUERY_CHARS", defaults.search.min_query_chars),
                max_matches_per_unit: env_or(
                    "AMNESIA_MAX_MATCHES_PER_UNIT",
                    defaults.search.max_matches_per_unit,
                ),
                excerpt_context: env_or("AMNESIA_EXCERPT_CONTEXT", defaults.search.excerpt_context),
            },
            render: RenderConfig {
                poll_attempts: env_or("AMNESIA_RENDER_POLL_ATTEMPTS", defaults.render.poll_attempts),
                poll_interval_ms: env_or(
                    "AMNESIA_RENDER_POLL_INTERVAL_MS",
                    defaults.render.poll_interval_ms,
                ),
            },
            cache: CacheConfig {
                max_sections: env_or("AMNESIA_SECTION_CACHE_SIZE", defaults.cache.max_sections),
            },
        }
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.search.min_query_chars, 2);
        assert_eq!(config.search.max_matches_per_unit, 200);
        assert_eq!(config.layout.line_tolerance, 2.0);
        assert_eq!(config.layout.gap_threshold, 2.0);
        assert_eq!(config.render.poll_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_env_override_and_fallback() {
        env::set_var("AMNESIA_MAX_MATCHES_PER_UNIT", "25");
        env::set_var("AMNESIA_GAP_THRESHOLD", "not-a-number");
        let config = EngineConfig::from_env();
        env::remove_var("AMNESIA_MAX_MATCHES_PER_UNIT");
        env::remove_var("AMNESIA_GAP_THRESHOLD");

        assert_eq!(config.search.max_matches_per_unit, 25);
        assert_eq!(config.layout.gap_threshold, 2.0);
    }
}
