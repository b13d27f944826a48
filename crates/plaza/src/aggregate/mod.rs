//! Aggregation orchestrator.
//!
//! Fans a target out to every selected adapter concurrently, merges what
//! comes back, persists canonical records, and optionally cascades from
//! areas into their stores. One adapter failing never aborts the others.

mod request;

pub use request::{AggregationError, AggregationRequest, AggregationResult, AggregationTarget};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::freshness::{Freshness, FreshnessGate, FreshnessPolicy};
use crate::merge::{Canonical, Canonicalizer, Observation};
use crate::models::{AreaRecord, RawArea, RawStore, StoreRecord};
use crate::sources::{
    AdapterError, AdapterRegistry, AreaScope, CityScope, SourceAdapter,
    DEFAULT_STORE_RADIUS_METERS,
};
use crate::stats::{AdapterFailure, RunStatistics, StatsRecorder, DEFAULT_ERROR_HISTORY};
use crate::store::{EntityStore, StoreError, StoreResult};

/// Default cap on adapter calls in flight across all runs.
pub const DEFAULT_MAX_PARALLEL_ADAPTERS: usize = 8;

/// Tuning for an [`Aggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// After persisting a city's areas, refresh each area's stores.
    pub cascade_stores: bool,
    pub max_parallel_adapters: usize,
    pub store_radius_meters: u32,
    pub error_history: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            cascade_stores: true,
            max_parallel_adapters: DEFAULT_MAX_PARALLEL_ADAPTERS,
            store_radius_meters: DEFAULT_STORE_RADIUS_METERS,
            error_history: DEFAULT_ERROR_HISTORY,
        }
    }
}

/// Anything that can run aggregation requests. The scheduler depends on
/// this rather than on [`Aggregator`] directly.
#[async_trait]
pub trait AggregationService: Send + Sync {
    async fn aggregate(
        &self,
        request: AggregationRequest,
    ) -> Result<AggregationResult, AggregationError>;

    fn statistics(&self) -> RunStatistics;
}

/// Successful and failed adapter calls of one fan-out.
struct FanOut<T> {
    observations: Vec<T>,
    used: Vec<String>,
    failures: Vec<AdapterFailure>,
}

/// The aggregation engine.
pub struct Aggregator {
    registry: AdapterRegistry,
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    policy: FreshnessPolicy,
    canonicalizer: Canonicalizer,
    stats: Arc<StatsRecorder>,
    permits: Arc<Semaphore>,
    options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(registry: AdapterRegistry, store: Arc<dyn EntityStore>) -> Self {
        let options = AggregatorOptions::default();
        Self {
            registry,
            store,
            clock: Arc::new(SystemClock),
            policy: FreshnessPolicy::default(),
            canonicalizer: Canonicalizer::default(),
            stats: Arc::new(StatsRecorder::new(options.error_history)),
            permits: Arc::new(Semaphore::new(options.max_parallel_adapters.max(1))),
            options,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Replace options. Resets statistics and the adapter permit pool.
    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.stats = Arc::new(StatsRecorder::new(options.error_history));
        self.permits = Arc::new(Semaphore::new(options.max_parallel_adapters.max(1)));
        self.options = options;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<dyn EntityStore> {
        Arc::clone(&self.store)
    }

    pub fn freshness_gate(&self) -> FreshnessGate {
        FreshnessGate::new(Arc::clone(&self.store), Arc::clone(&self.clock), self.policy)
    }

    pub fn statistics(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    /// Run one aggregation request.
    ///
    /// Returns `Err` only for caller mistakes (unknown area, no matching
    /// adapters). Adapter and per-entity persistence failures are reported
    /// inside the result.
    #[instrument(skip(self, request), fields(target = %request.target))]
    pub async fn aggregate(
        &self,
        request: AggregationRequest,
    ) -> Result<AggregationResult, AggregationError> {
        let adapters = self.registry.select(request.adapters.as_deref());
        if adapters.is_empty() {
            let asked = match &request.adapters {
                Some(names) => names.join(", "),
                None => "all".to_string(),
            };
            return Err(AggregationError::NoAdapters(asked));
        }

        let mut result = AggregationResult::begin(request.target.clone(), self.clock.now());

        match &request.target {
            AggregationTarget::City { id, name } => {
                self.aggregate_city(id, name, &adapters, request.force_refresh, &mut result)
                    .await;
            }
            AggregationTarget::Area { id } => {
                self.aggregate_area(id, &adapters, request.force_refresh, &mut result)
                    .await?;
            }
        }

        result.finished_at = self.clock.now();
        if result.from_cache {
            self.stats.record_run(0, 0, result.finished_at);
        } else {
            let areas = match request.target {
                AggregationTarget::City { .. } => result.areas_count,
                AggregationTarget::Area { .. } => 0,
            };
            self.stats.record_run(areas, result.stores_count, result.finished_at);
        }

        if result.success {
            info!(
                areas = result.areas_count,
                stores = result.stores_count,
                from_cache = result.from_cache,
                errors = result.errors.len(),
                "Aggregated {}",
                result.target
            );
        } else {
            warn!(
                "Aggregation of {} failed: {}",
                result.target,
                result.failure.as_deref().unwrap_or("unknown failure")
            );
        }

        Ok(result)
    }

    async fn aggregate_city(
        &self,
        city_id: &str,
        city_name: &str,
        adapters: &[Arc<dyn SourceAdapter>],
        force_refresh: bool,
        result: &mut AggregationResult,
    ) {
        if !force_refresh {
            match self.freshness_gate().city_is_fresh(city_id).await {
                Ok(true) => {
                    debug!("City {} is fresh, serving persisted data", city_id);
                    self.serve_city_cache(city_id, result).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!("Freshness check failed for city {}: {}", city_id, e),
            }
        }

        let scope = CityScope::new(city_id, city_name);
        let label = result.target.to_string();
        let fetched = self
            .fan_out(adapters, &label, |adapter| {
                let scope = scope.clone();
                async move { adapter.fetch_areas(&scope).await }
            })
            .await;

        result.errors.extend(fetched.failures);
        result.adapters_used = fetched.used;

        if result.adapters_used.is_empty() {
            if !self.serve_city_cache(city_id, result).await {
                result.success = false;
                result.failure = Some(format!(
                    "all {} adapters failed and no cached data exists for {}",
                    adapters.len(),
                    label
                ));
            }
            return;
        }

        let merged = self.canonicalizer.merge(city_id, fetched.observations);
        result.rejected += merged.rejected;
        result.collisions += merged.collisions;

        let now = self.clock.now();
        let mut persisted = Vec::with_capacity(merged.entities.len());
        for canonical in merged.entities {
            match self.persist_area(city_id, canonical, now).await {
                Ok(area) => persisted.push(area),
                Err(e) => {
                    warn!("Failed to persist area for {}: {}", label, e);
                    result.persistence_failures += 1;
                }
            }
        }
        result.areas_count = persisted.len();

        if self.options.cascade_stores {
            // Only adapters that answered the area fetch are asked for stores.
            let healthy: Vec<Arc<dyn SourceAdapter>> = adapters
                .iter()
                .filter(|a| result.adapters_used.iter().any(|n| n == a.name()))
                .cloned()
                .collect();
            for area in &persisted {
                let stored = self.refresh_stores(area, &healthy, result).await;
                result.stores_count += stored.unwrap_or(0);
            }
        }
    }

    async fn aggregate_area(
        &self,
        area_id: &str,
        adapters: &[Arc<dyn SourceAdapter>],
        force_refresh: bool,
        result: &mut AggregationResult,
    ) -> Result<(), AggregationError> {
        let area = self
            .store
            .get_area(area_id)
            .await?
            .ok_or_else(|| AggregationError::UnknownArea(area_id.to_string()))?;
        result.areas_count = 1;

        if !force_refresh {
            match self.freshness_gate().evaluate(area_id).await {
                Ok(Freshness::Fresh) => {
                    result.from_cache = true;
                    result.stores_count = self.cached_store_count(area_id).await;
                    return Ok(());
                }
                Ok(verdict) => debug!("Area {} is {}, refreshing", area_id, verdict.as_str()),
                Err(e) => warn!("Freshness check failed for area {}: {}", area_id, e),
            }
        }

        match self.refresh_stores(&area, adapters, result).await {
            Some(stored) => result.stores_count = stored,
            None => {
                let cached = self.cached_store_count(area_id).await;
                if cached > 0 {
                    result.from_cache = true;
                    result.stores_count = cached;
                } else {
                    result.success = false;
                    result.areas_count = 0;
                    result.failure = Some(format!(
                        "all {} adapters failed and no cached stores exist for area {}",
                        adapters.len(),
                        area_id
                    ));
                }
            }
        }

        Ok(())
    }

    /// Fetch, merge, and persist the stores around one area, then record the
    /// area's store count. Returns `None` when every adapter failed.
    async fn refresh_stores(
        &self,
        area: &AreaRecord,
        adapters: &[Arc<dyn SourceAdapter>],
        result: &mut AggregationResult,
    ) -> Option<usize> {
        let scope = AreaScope {
            area_id: area.id.clone(),
            area_name: area.name.clone(),
            city_id: area.city_id.clone(),
            coordinates: area.coordinates,
            radius_meters: self.options.store_radius_meters,
        };
        let label = format!("area:{}", area.id);
        let fetched = self
            .fan_out(adapters, &label, |adapter| {
                let scope = scope.clone();
                async move { adapter.fetch_stores(&scope).await }
            })
            .await;

        result.errors.extend(fetched.failures);
        if fetched.used.is_empty() {
            return None;
        }
        for name in fetched.used {
            if !result.adapters_used.contains(&name) {
                result.adapters_used.push(name);
            }
        }

        let merged = self.canonicalizer.merge(&area.id, fetched.observations);
        result.rejected += merged.rejected;
        result.collisions += merged.collisions;

        let now = self.clock.now();
        let mut stored = 0;
        for canonical in merged.entities {
            match self.persist_store(&area.id, canonical, now).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    warn!("Failed to persist store for {}: {}", label, e);
                    result.persistence_failures += 1;
                }
            }
        }

        let count = match self.store.list_stores_by_area(&area.id).await {
            Ok(stores) => stores.len() as i64,
            Err(e) => {
                warn!("Failed to count stores for {}: {}", label, e);
                stored as i64
            }
        };
        if let Err(e) = self.store.set_store_count(&area.id, count).await {
            warn!("Failed to update store count for {}: {}", label, e);
            result.persistence_failures += 1;
        }

        Some(stored)
    }

    /// Call every adapter concurrently and wait for all of them.
    ///
    /// Results are collected in registration order regardless of which call
    /// finishes first.
    async fn fan_out<T, F, Fut>(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        target: &str,
        call: F,
    ) -> FanOut<T>
    where
        T: Observation,
        F: Fn(Arc<dyn SourceAdapter>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, AdapterError>> + Send + 'static,
    {
        let handles = adapters.iter().map(|adapter| {
            let permits = Arc::clone(&self.permits);
            let pending = call(Arc::clone(adapter));
            tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
                pending.await
            })
        });
        let joined = join_all(handles).await;

        let mut out = FanOut {
            observations: Vec::new(),
            used: Vec::new(),
            failures: Vec::new(),
        };

        for (adapter, joined) in adapters.iter().zip(joined) {
            let name = adapter.name();
            let outcome = joined.unwrap_or_else(|e| Err(AdapterError::Panicked(e.to_string())));
            match outcome {
                Ok(observations) => {
                    debug!("{} returned {} observations for {}", name, observations.len(), target);
                    out.used.push(name.to_string());
                    out.observations
                        .extend(observations.into_iter().map(|mut observation| {
                            observation.attribute(name);
                            observation
                        }));
                }
                Err(e) => {
                    warn!("Adapter {} failed for {}: {}", name, target, e);
                    let failure = AdapterFailure {
                        adapter: name.to_string(),
                        target: target.to_string(),
                        message: e.to_string(),
                        at: self.clock.now(),
                    };
                    self.stats.record_failure(failure.clone());
                    out.failures.push(failure);
                }
            }
        }

        out
    }

    async fn persist_area(
        &self,
        city_id: &str,
        canonical: Canonical<RawArea>,
        now: DateTime<Utc>,
    ) -> StoreResult<AreaRecord> {
        let record = match self.store.get_area(&canonical.id).await? {
            Some(mut existing) => {
                existing.apply(canonical.value, now);
                existing
            }
            None => AreaRecord::from_observation(canonical.id, city_id, canonical.value, now)
                .ok_or_else(|| StoreError::Serialization("area without name or position".into()))?,
        };
        self.store.upsert_area(&record).await?;
        Ok(record)
    }

    async fn persist_store(
        &self,
        area_id: &str,
        canonical: Canonical<RawStore>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let record = match self.store.get_store(&canonical.id).await? {
            Some(mut existing) => {
                existing.apply(canonical.value, now);
                existing
            }
            None => StoreRecord::from_observation(canonical.id, area_id, canonical.value, now)
                .ok_or_else(|| StoreError::Serialization("store without name or position".into()))?,
        };
        self.store.upsert_store(&record).await
    }

    /// Fill counts from persisted areas. Returns false if none exist.
    async fn serve_city_cache(&self, city_id: &str, result: &mut AggregationResult) -> bool {
        let cached = match self.store.list_areas_by_city(city_id).await {
            Ok(areas) => areas,
            Err(e) => {
                warn!("Failed to read cached areas for city {}: {}", city_id, e);
                return false;
            }
        };
        if cached.is_empty() {
            return false;
        }
        result.from_cache = true;
        result.areas_count = cached.len();
        result.stores_count = cached.iter().map(|a| a.store_count.max(0) as usize).sum();
        true
    }

    async fn cached_store_count(&self, area_id: &str) -> usize {
        match self.store.list_stores_by_area(area_id).await {
            Ok(stores) => stores.len(),
            Err(e) => {
                warn!("Failed to read cached stores for area {}: {}", area_id, e);
                0
            }
        }
    }
}

#[async_trait]
impl AggregationService for Aggregator {
    async fn aggregate(
        &self,
        request: AggregationRequest,
    ) -> Result<AggregationResult, AggregationError> {
        Aggregator::aggregate(self, request).await
    }

    fn statistics(&self) -> RunStatistics {
        Aggregator::statistics(self)
    }
}
