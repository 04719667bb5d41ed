//! Benchmark counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Stats {
    map_checks: AtomicU64,
    cache_hits: AtomicU64,
    verifications: AtomicU64,
    permits: AtomicU64,
    denials: AtomicU64,
    verify_nanos: AtomicU64,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Exec mappings that reached the pipeline.
    pub map_checks: u64,
    pub cache_hits: u64,
    /// Digests computed and checked against the key.
    pub verifications: u64,
    pub permits: u64,
    /// Denials, counted before permissive mode is applied.
    pub denials: u64,
    /// Time spent holding the verification lock.
    pub verify_time: Duration,
}

impl Stats {
    pub(crate) fn map_check(&self) {
        self.map_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn verification(&self, elapsed: Duration) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        self.add_time(elapsed);
    }

    pub(crate) fn add_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.verify_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn permit(&self) {
        self.permits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn denial(&self) {
        self.denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            map_checks: self.map_checks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            verifications: self.verifications.load(Ordering::Relaxed),
            permits: self.permits.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
            verify_time: Duration::from_nanos(self.verify_nanos.load(Ordering::Relaxed)),
        }
    }
}
