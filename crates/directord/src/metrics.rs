//! Per-request-type latency and error counters.
//!
//! The collector keeps running aggregates (count, errors, total, min, max) per
//! request type rather than every observed duration, so memory stays bounded
//! for the lifetime of the daemon. All mutation happens under one mutex, which
//! keeps the invariant that the totals equal the per-type sums for every
//! snapshot.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

const METRICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::metrics");

/// Thread-safe aggregator shared by every connection.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
}

#[derive(Debug, Default)]
struct MetricsState {
    epoch: u64,
    total_requests: u64,
    total_errors: u64,
    by_type: BTreeMap<String, TypeCounters>,
}

#[derive(Debug, Clone, Copy)]
struct TypeCounters {
    count: u64,
    errors: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl TypeCounters {
    fn starting_at(duration: Duration) -> Self {
        Self {
            count: 0,
            errors: 0,
            total: Duration::ZERO,
            min: duration,
            max: duration,
        }
    }

    fn observe(&mut self, duration: Duration, success: bool) {
        self.count = self.count.saturating_add(1);
        if !success {
            self.errors = self.errors.saturating_add(1);
        }
        self.total = self.total.saturating_add(duration);
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
    }

    fn snapshot(&self) -> TypeSnapshot {
        let avg_time_ms = if self.count == 0 {
            0.0
        } else {
            millis(self.total) / self.count as f64
        };
        TypeSnapshot {
            count: self.count,
            errors: self.errors,
            avg_time_ms,
            min_time_ms: millis(self.min),
            max_time_ms: millis(self.max),
        }
    }
}

/// Point-in-time view of the accumulated counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests observed across all types.
    pub total_requests: u64,
    /// Failed requests across all types.
    pub total_errors: u64,
    /// Counters keyed by request type.
    pub by_type: BTreeMap<String, TypeSnapshot>,
}

/// Counters for a single request type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSnapshot {
    /// Requests observed for this type.
    pub count: u64,
    /// Requests of this type that failed.
    pub errors: u64,
    /// Mean dispatch latency in milliseconds.
    pub avg_time_ms: f64,
    /// Fastest dispatch in milliseconds.
    pub min_time_ms: f64,
    /// Slowest dispatch in milliseconds.
    pub max_time_ms: f64,
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one observation for `request_type`.
    pub fn record(&self, request_type: &str, duration: Duration, success: bool) {
        let mut state = self.lock();
        Self::apply(&mut state, request_type, duration, success);
    }

    /// Records an observation only if no reset happened since `epoch`.
    ///
    /// The router reads [`MetricsCollector::epoch`] before invoking a handler;
    /// requests that were in flight when the counters were reset (including
    /// the reset request itself) are dropped so the reset is observed as a
    /// clean zero.
    pub fn record_since(&self, epoch: u64, request_type: &str, duration: Duration, success: bool) {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(
                target: METRICS_TARGET,
                request_type,
                "dropping observation that straddled a reset"
            );
            return;
        }
        Self::apply(&mut state, request_type, duration, success);
    }

    /// Current reset generation.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Computes a snapshot of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            total_requests: state.total_requests,
            total_errors: state.total_errors,
            by_type: state
                .by_type
                .iter()
                .map(|(request_type, counters)| (request_type.clone(), counters.snapshot()))
                .collect(),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.epoch = state.epoch.wrapping_add(1);
        state.total_requests = 0;
        state.total_errors = 0;
        state.by_type.clear();
        debug!(target: METRICS_TARGET, epoch = state.epoch, "metrics reset");
    }

    fn apply(state: &mut MetricsState, request_type: &str, duration: Duration, success: bool) {
        state.total_requests = state.total_requests.saturating_add(1);
        if !success {
            state.total_errors = state.total_errors.saturating_add(1);
        }
        state
            .by_type
            .entry(request_type.to_owned())
            .or_insert_with(|| TypeCounters::starting_at(duration))
            .observe(duration, success);
    }

    // Counters stay consistent even if a holder panicked: every update is
    // applied in full before the guard drops.
    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
