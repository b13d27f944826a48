//! Aggregation targets, requests, and results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stats::AdapterFailure;
use crate::store::StoreError;

/// What to aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationTarget {
    /// Every area of a city, optionally cascading into their stores.
    City { id: String, name: String },
    /// The stores of one persisted area.
    Area { id: String },
}

impl AggregationTarget {
    pub fn city(id: &str, name: &str) -> Self {
        Self::City {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn area(id: &str) -> Self {
        Self::Area { id: id.to_string() }
    }
}

impl fmt::Display for AggregationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City { id, .. } => write!(f, "city:{}", id),
            Self::Area { id } => write!(f, "area:{}", id),
        }
    }
}

/// One call to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationRequest {
    pub target: AggregationTarget,
    /// Adapter names to use; `None` means every registered adapter.
    pub adapters: Option<Vec<String>>,
    /// Skip the freshness gate.
    pub force_refresh: bool,
}

impl AggregationRequest {
    pub fn new(target: AggregationTarget) -> Self {
        Self {
            target,
            adapters: None,
            force_refresh: false,
        }
    }

    pub fn with_adapters(mut self, adapters: Option<Vec<String>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn force(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub target: AggregationTarget,
    /// False only when no adapter returned data and nothing was cached.
    pub success: bool,
    /// Served from persisted data instead of fresh adapter output.
    pub from_cache: bool,
    pub areas_count: usize,
    pub stores_count: usize,
    /// Adapters that returned data, in registration order.
    pub adapters_used: Vec<String>,
    pub errors: Vec<AdapterFailure>,
    /// Observations dropped for missing identity fields.
    pub rejected: usize,
    /// Observations folded into another with the same identity.
    pub collisions: usize,
    pub persistence_failures: usize,
    /// Why the run failed, when `success` is false.
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AggregationResult {
    pub(crate) fn begin(target: AggregationTarget, started_at: DateTime<Utc>) -> Self {
        Self {
            target,
            success: true,
            from_cache: false,
            areas_count: 0,
            stores_count: 0,
            adapters_used: Vec::new(),
            errors: Vec::new(),
            rejected: 0,
            collisions: 0,
            persistence_failures: 0,
            failure: None,
            started_at,
            finished_at: started_at,
        }
    }

    /// True when some adapters failed but the run still produced data.
    pub fn is_partial(&self) -> bool {
        self.success && !self.errors.is_empty()
    }
}

/// Caller mistakes that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("Unknown area: {0}")]
    UnknownArea(String),

    #[error("No registered adapter matches the request (asked for: {0})")]
    NoAdapters(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_display() {
        assert_eq!(AggregationTarget::city("hz", "Hangzhou").to_string(), "city:hz");
        assert_eq!(AggregationTarget::area("a1").to_string(), "area:a1");
    }

    #[test]
    fn request_builder() {
        let request = AggregationRequest::new(AggregationTarget::area("a1"))
            .with_adapters(Some(vec!["amap".to_string()]))
            .force(true);
        assert!(request.force_refresh);
        assert_eq!(request.adapters, Some(vec!["amap".to_string()]));
    }
}
