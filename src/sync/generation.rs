use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic tag for issued queries. A result is applied only while its
/// generation is still the latest, so a slow early response never overwrites a
/// fast later one.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration(Arc<AtomicU64>);

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation; the first is 1.
    pub fn issue(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest()
    }
}
