//! Per-session unit text cache
//!
//! Instance-scoped: every search session owns one and clears it wholesale
//! when the document is replaced. There is no partial invalidation.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::document::ReconstructedUnitText;

/// Cached extraction result for one unit
#[derive(Debug, Clone)]
pub struct CachedUnit<S> {
    /// Format-specific source (page fragments, or walked section nodes)
    pub source: S,
    pub text: ReconstructedUnitText,
}

/// LRU-bounded map from unit index to reconstructed text
pub struct UnitCache<S> {
    entries: LruCache<usize, CachedUnit<S>>,
}

impl<S: Clone> UnitCache<S> {
    /// Create a cache holding at most `capacity` units (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, unit_index: usize) -> Option<CachedUnit<S>> {
        self.entries.get(&unit_index).cloned()
    }

    pub fn peek_text(&self, unit_index: usize) -> Option<&ReconstructedUnitText> {
        self.entries.peek(&unit_index).map(|entry| &entry.text)
    }

    pub fn insert(&mut self, unit_index: usize, source: S, text: ReconstructedUnitText) {
        self.entries.put(unit_index, CachedUnit { source, text });
    }

    pub fn contains(&self, unit_index: usize) -> bool {
        self.entries.contains(&unit_index)
    }

    /// All cached texts, ascending by unit index
    pub fn texts(&self) -> Vec<ReconstructedUnitText> {
        let mut texts: Vec<ReconstructedUnitText> =
            self.entries.iter().map(|(_, entry)| entry.text.clone()).collect();
        texts.sort_by_key(|text| text.unit_index);
        texts
    }

    /// Grow or shrink capacity, keeping the most recently used entries
    pub fn resize(&mut self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self.entries.resize(capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texts_sorted_by_unit() {
        let mut cache: UnitCache<()> = UnitCache::new(4);
        cache.insert(2, (), ReconstructedUnitText::empty(2));
        cache.insert(0, (), ReconstructedUnitText::empty(0));
        cache.insert(1, (), ReconstructedUnitText::empty(1));

        let order: Vec<usize> = cache.texts().iter().map(|t| t.unit_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_eviction_and_clear() {
        let mut cache: UnitCache<()> = UnitCache::new(2);
        cache.insert(0, (), ReconstructedUnitText::empty(0));
        cache.insert(1, (), ReconstructedUnitText::empty(1));
        cache.insert(2, (), ReconstructedUnitText::empty(2));

        assert!(!cache.contains(0));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache: UnitCache<()> = UnitCache::new(0);
        cache.insert(5, (), ReconstructedUnitText::empty(5));
        assert!(cache.contains(5));
    }
}
