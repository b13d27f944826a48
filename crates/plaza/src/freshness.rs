//! Freshness gate: decides whether persisted data can be served as-is.
//!
//! An area is fresh only when it was updated inside the staleness window
//! *and* it looks complete (stores counted, rated, and at least one store
//! persisted). Failing either check forces a refresh.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::store::{EntityStore, StoreResult};

/// Default staleness window in hours (2 days).
pub const DEFAULT_FRESHNESS_WINDOW_HOURS: i64 = 48;

/// Staleness window applied by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub window: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_FRESHNESS_WINDOW_HOURS)
    }
}

impl FreshnessPolicy {
    /// Out-of-range values fall back to the default window.
    pub fn from_hours(hours: i64) -> Self {
        let window = Duration::try_hours(hours)
            .or_else(|| Duration::try_hours(DEFAULT_FRESHNESS_WINDOW_HOURS))
            .unwrap_or_default();
        Self { window }
    }
}

/// Verdict for one area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Nothing persisted yet.
    Missing,
    /// Updated outside the staleness window.
    Stale,
    /// Recent but missing stores or a rating.
    Incomplete,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Missing => "missing",
            Self::Stale => "stale",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Checks persisted areas against a [`FreshnessPolicy`].
#[derive(Clone)]
pub struct FreshnessGate {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    policy: FreshnessPolicy,
}

impl FreshnessGate {
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        policy: FreshnessPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Classify one area.
    pub async fn evaluate(&self, area_id: &str) -> StoreResult<Freshness> {
        let Some(area) = self.store.get_area(area_id).await? else {
            return Ok(Freshness::Missing);
        };

        let age = self.clock.now() - area.updated_at;
        if age > self.policy.window {
            debug!(area_id, age_hours = age.num_hours(), "area is stale");
            return Ok(Freshness::Stale);
        }

        if area.store_count <= 0 || area.rating.is_nan() || area.rating <= 0.0 {
            return Ok(Freshness::Incomplete);
        }

        let stores = self.store.list_stores_by_area(area_id).await?;
        if stores.is_empty() {
            return Ok(Freshness::Incomplete);
        }

        Ok(Freshness::Fresh)
    }

    /// Whether an area must be re-fetched.
    pub async fn needs_refresh(&self, area_id: &str) -> StoreResult<bool> {
        Ok(!self.evaluate(area_id).await?.is_fresh())
    }

    /// A city is fresh when it has areas and every one of them is fresh.
    pub async fn city_is_fresh(&self, city_id: &str) -> StoreResult<bool> {
        let areas = self.store.list_areas_by_city(city_id).await?;
        if areas.is_empty() {
            return Ok(false);
        }
        for area in &areas {
            if !self.evaluate(&area.id).await?.is_fresh() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
