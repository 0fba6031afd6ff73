//! Request concurrency and timing counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide request counters.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    total: AtomicU64,
    processing_nanos: AtomicU64,
}

/// Point-in-time copy of [`RequestMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests currently being processed.
    pub in_flight: usize,
    /// Most requests ever processed at once.
    pub high_water: usize,
    /// Requests started since the master came up.
    pub total: u64,
    /// Time spent processing, summed over every finished request.
    pub processing: Duration,
}

impl RequestMetrics {
    /// Counters starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request as in flight until the returned timer drops.
    #[must_use]
    pub fn begin(&self) -> RequestTimer<'_> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(now_in_flight, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
        RequestTimer {
            metrics: self,
            started: Instant::now(),
        }
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_flight: self.in_flight.load(Ordering::Acquire),
            high_water: self.high_water.load(Ordering::Acquire),
            total: self.total.load(Ordering::Relaxed),
            processing: Duration::from_nanos(self.processing_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Ends the in-flight accounting for one request on drop.
#[derive(Debug)]
pub struct RequestTimer<'a> {
    metrics: &'a RequestMetrics,
    started: Instant,
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        let elapsed = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.metrics
            .processing_nanos
            .fetch_add(elapsed, Ordering::Relaxed);
        self.metrics.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
