//! Process-lifetime run statistics.
//!
//! Counters and a bounded ring of recent adapter failures, shared between
//! concurrent runs behind a mutex. Nothing here is persisted.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of adapter failures kept in the ring.
pub const DEFAULT_ERROR_HISTORY: usize = 100;

/// One adapter failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterFailure {
    pub adapter: String,
    /// City or area the call was for.
    pub target: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Snapshot of [`StatsRecorder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub runs: u64,
    pub areas_aggregated: u64,
    pub stores_aggregated: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Most recent failures, oldest first.
    pub errors: Vec<AdapterFailure>,
}

#[derive(Debug, Default)]
struct Counters {
    runs: u64,
    areas_aggregated: u64,
    stores_aggregated: u64,
    last_run_at: Option<DateTime<Utc>>,
    errors: VecDeque<AdapterFailure>,
}

/// Thread-safe statistics shared by one aggregator.
#[derive(Debug)]
pub struct StatsRecorder {
    counters: Mutex<Counters>,
    capacity: usize,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_HISTORY)
    }
}

impl StatsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push a failure, evicting the oldest when full.
    pub fn record_failure(&self, failure: AdapterFailure) {
        let mut counters = self.lock();
        if counters.errors.len() == self.capacity {
            counters.errors.pop_front();
        }
        counters.errors.push_back(failure);
    }

    /// Fold a finished run into the totals.
    pub fn record_run(&self, areas: usize, stores: usize, finished_at: DateTime<Utc>) {
        let mut counters = self.lock();
        counters.runs += 1;
        counters.areas_aggregated += areas as u64;
        counters.stores_aggregated += stores as u64;
        counters.last_run_at = Some(finished_at);
    }

    pub fn snapshot(&self) -> RunStatistics {
        let counters = self.lock();
        RunStatistics {
            runs: counters.runs,
            areas_aggregated: counters.areas_aggregated,
            stores_aggregated: counters.stores_aggregated,
            last_run_at: counters.last_run_at,
            errors: counters.errors.iter().cloned().collect(),
        }
    }
}
