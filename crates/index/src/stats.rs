//! Store statistics.
//!
//! This module provides counters kept by the keyed store for diagnostics.

/// Statistics for a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries added over the store's lifetime.
    inserts: u64,
    /// Entries removed over the store's lifetime.
    removes: u64,
    /// Number of rehashes.
    resizes: u64,
}

impl StoreStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of inserts.
    pub fn inserts(&self) -> u64 {
        self.inserts
    }

    /// Returns the number of removals.
    pub fn removes(&self) -> u64 {
        self.removes
    }

    /// Returns the number of rehashes.
    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    pub(crate) fn record_insert(&mut self) {
        self.inserts += 1;
    }

    pub(crate) fn record_remove(&mut self, count: usize) {
        self.removes += count as u64;
    }

    pub(crate) fn record_resize(&mut self) {
        self.resizes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counters() {
        let mut stats = StoreStats::new();
        stats.record_insert();
        stats.record_insert();
        stats.record_remove(1);
        stats.record_resize();
        assert_eq!(stats.inserts(), 2);
        assert_eq!(stats.removes(), 1);
        assert_eq!(stats.resizes(), 1);
    }
}
