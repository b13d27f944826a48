//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use plaza::models::{AreaRecord, StoreRecord};
use plaza::sources::ProbeReport;
use plaza::store::StoreResult;
use plaza::{
    AdapterError, AreaScope, CityScope, Coordinates, EntityStore, InMemoryEntityStore, RawArea,
    RawStore, SourceAdapter, StoreError,
};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn riverside(source: &str, lng: f64, lat: f64, hot: i64) -> RawArea {
    RawArea::new(source, "Riverside Plaza", Coordinates::new(lng, lat))
        .with_hot_value(hot)
        .with_rating(4.4)
}

pub fn store(source: &str, name: &str, lng: f64, lat: f64) -> RawStore {
    RawStore::new(source, name, Coordinates::new(lng, lat)).with_rating(4.0)
}

/// Adapter returning canned responses that tests can swap between runs.
pub struct ScriptedAdapter {
    name: String,
    areas: Mutex<Result<Vec<RawArea>, AdapterError>>,
    stores: Mutex<Result<Vec<RawStore>, AdapterError>>,
    pub area_calls: AtomicUsize,
    pub store_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            areas: Mutex::new(Ok(Vec::new())),
            stores: Mutex::new(Ok(Vec::new())),
            area_calls: AtomicUsize::new(0),
            store_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_areas(self, areas: Vec<RawArea>) -> Self {
        self.set_areas(Ok(areas));
        self
    }

    pub fn with_stores(self, stores: Vec<RawStore>) -> Self {
        self.set_stores(Ok(stores));
        self
    }

    pub fn failing(name: &str, error: AdapterError) -> Self {
        let adapter = Self::new(name);
        adapter.fail_with(error);
        adapter
    }

    pub fn set_areas(&self, areas: Result<Vec<RawArea>, AdapterError>) {
        *self.areas.lock().unwrap() = areas;
    }

    pub fn set_stores(&self, stores: Result<Vec<RawStore>, AdapterError>) {
        *self.stores.lock().unwrap() = stores;
    }

    pub fn fail_with(&self, error: AdapterError) {
        self.set_areas(Err(error.clone()));
        self.set_stores(Err(error));
    }

    pub fn area_calls(&self) -> usize {
        self.area_calls.load(Ordering::SeqCst)
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_areas(&self, _city: &CityScope) -> Result<Vec<RawArea>, AdapterError> {
        self.area_calls.fetch_add(1, Ordering::SeqCst);
        self.areas.lock().unwrap().clone()
    }

    async fn fetch_stores(&self, _area: &AreaScope) -> Result<Vec<RawStore>, AdapterError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.stores.lock().unwrap().clone()
    }

    async fn probe(&self) -> ProbeReport {
        ProbeReport::ok("scripted")
    }
}

/// Adapter whose area fetches block until the gate releases a permit.
pub struct GatedAdapter {
    pub gate: Arc<Semaphore>,
    pub calls: AtomicUsize,
}

impl GatedAdapter {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait]
impl SourceAdapter for GatedAdapter {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch_areas(&self, _city: &CityScope) -> Result<Vec<RawArea>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        Ok(Vec::new())
    }

    async fn fetch_stores(&self, _area: &AreaScope) -> Result<Vec<RawStore>, AdapterError> {
        Ok(Vec::new())
    }
}

/// In-memory store that refuses to persist areas with a given name.
pub struct PickyStore {
    inner: InMemoryEntityStore,
    refuse: String,
}

impl PickyStore {
    pub fn refusing(name: &str) -> Self {
        Self {
            inner: InMemoryEntityStore::new(),
            refuse: name.to_string(),
        }
    }
}

#[async_trait]
impl EntityStore for PickyStore {
    async fn get_area(&self, id: &str) -> StoreResult<Option<AreaRecord>> {
        self.inner.get_area(id).await
    }

    async fn get_store(&self, id: &str) -> StoreResult<Option<StoreRecord>> {
        self.inner.get_store(id).await
    }

    async fn upsert_area(&self, area: &AreaRecord) -> StoreResult<()> {
        if area.name == self.refuse {
            return Err(StoreError::Database(format!("constraint failed for {}", area.name)));
        }
        self.inner.upsert_area(area).await
    }

    async fn upsert_store(&self, store: &StoreRecord) -> StoreResult<()> {
        self.inner.upsert_store(store).await
    }

    async fn list_areas_by_city(&self, city_id: &str) -> StoreResult<Vec<AreaRecord>> {
        self.inner.list_areas_by_city(city_id).await
    }

    async fn list_stores_by_area(&self, area_id: &str) -> StoreResult<Vec<StoreRecord>> {
        self.inner.list_stores_by_area(area_id).await
    }

    async fn set_store_count(&self, area_id: &str, count: i64) -> StoreResult<()> {
        self.inner.set_store_count(area_id, count).await
    }
}
