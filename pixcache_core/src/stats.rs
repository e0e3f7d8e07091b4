//! Cache statistics

use serde::Serialize;

/// Point-in-time statistics for a cache tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub total_size_bytes: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, `None` before the first lookup
    pub fn hit_ratio(&self) -> Option<f64> {
        let lookups = self.hit_count + self.miss_count;
        (lookups > 0).then(|| self.hit_count as f64 / lookups as f64)
    }
}
