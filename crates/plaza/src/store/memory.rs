//! In-memory entity store for single-process operation and tests.
//!
//! State is not persisted across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EntityStore, StoreResult};
use crate::models::{AreaRecord, StoreRecord};

#[derive(Debug, Default)]
struct Tables {
    areas: HashMap<String, AreaRecord>,
    stores: HashMap<String, StoreRecord>,
}

/// Lock-based store keeping every record in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn area_count(&self) -> usize {
        self.tables.read().await.areas.len()
    }

    pub async fn store_count(&self) -> usize {
        self.tables.read().await.stores.len()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get_area(&self, id: &str) -> StoreResult<Option<AreaRecord>> {
        Ok(self.tables.read().await.areas.get(id).cloned())
    }

    async fn get_store(&self, id: &str) -> StoreResult<Option<StoreRecord>> {
        Ok(self.tables.read().await.stores.get(id).cloned())
    }

    async fn upsert_area(&self, area: &AreaRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mut row = area.clone();
        if let Some(existing) = tables.areas.get(&area.id) {
            row.created_at = existing.created_at;
            row.store_count = existing.store_count;
        }
        tables.areas.insert(row.id.clone(), row);
        Ok(())
    }

    async fn upsert_store(&self, store: &StoreRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mut row = store.clone();
        if let Some(existing) = tables.stores.get(&store.id) {
            row.created_at = existing.created_at;
        }
        tables.stores.insert(row.id.clone(), row);
        Ok(())
    }

    async fn list_areas_by_city(&self, city_id: &str) -> StoreResult<Vec<AreaRecord>> {
        let tables = self.tables.read().await;
        let mut areas: Vec<AreaRecord> = tables
            .areas
            .values()
            .filter(|a| a.city_id == city_id)
            .cloned()
            .collect();
        areas.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(areas)
    }

    async fn list_stores_by_area(&self, area_id: &str) -> StoreResult<Vec<StoreRecord>> {
        let tables = self.tables.read().await;
        let mut stores: Vec<StoreRecord> = tables
            .stores
            .values()
            .filter(|s| s.area_id == area_id)
            .cloned()
            .collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(stores)
    }

    async fn set_store_count(&self, area_id: &str, count: i64) -> StoreResult<()> {
        if let Some(area) = self.tables.write().await.areas.get_mut(area_id) {
            area.store_count = count;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, RawArea, RawStore};
    use chrono::{DateTime, Duration};

    fn area(id: &str, city: &str, name: &str) -> AreaRecord {
        let raw = RawArea::new("test", name, Coordinates::new(120.2, 30.1));
        AreaRecord::from_observation(id.into(), city, raw, DateTime::UNIX_EPOCH).unwrap()
    }

    #[tokio::test]
    async fn upsert_keeps_created_at() {
        let store = InMemoryEntityStore::new();
        store.upsert_area(&area("a1", "hz", "Old Town")).await.unwrap();

        let mut updated = area("a1", "hz", "Old Town");
        updated.created_at = DateTime::UNIX_EPOCH + Duration::days(5);
        updated.hot_value = 90;
        store.upsert_area(&updated).await.unwrap();

        let stored = store.get_area("a1").await.unwrap().unwrap();
        assert_eq!(stored.created_at, DateTime::UNIX_EPOCH);
        assert_eq!(stored.hot_value, 90);
        assert_eq!(store.area_count().await, 1);
    }

    #[tokio::test]
    async fn lists_are_scoped_and_sorted() {
        let store = InMemoryEntityStore::new();
        store.upsert_area(&area("a2", "hz", "Zeta")).await.unwrap();
        store.upsert_area(&area("a1", "hz", "Alpha")).await.unwrap();
        store.upsert_area(&area("a3", "sh", "Bund")).await.unwrap();

        let names: Vec<String> = store
            .list_areas_by_city("hz")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        let raw = RawStore::new("test", "Noodle Bar", Coordinates::new(120.2, 30.1));
        let record =
            StoreRecord::from_observation("s1".into(), "a1", raw, DateTime::UNIX_EPOCH).unwrap();
        store.upsert_store(&record).await.unwrap();
        assert_eq!(store.list_stores_by_area("a1").await.unwrap().len(), 1);
        assert!(store.list_stores_by_area("a2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_store_count_updates_existing_area_only() {
        let store = InMemoryEntityStore::new();
        store.upsert_area(&area("a1", "hz", "Old Town")).await.unwrap();
        store.set_store_count("a1", 7).await.unwrap();
        store.set_store_count("missing", 3).await.unwrap();

        assert_eq!(store.get_area("a1").await.unwrap().unwrap().store_count, 7);
        assert!(store.get_area("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_does_not_reset_store_count() {
        let store = InMemoryEntityStore::new();
        store.upsert_area(&area("a1", "hz", "Old Town")).await.unwrap();
        store.set_store_count("a1", 3).await.unwrap();

        let mut stale = area("a1", "hz", "Old Town");
        stale.store_count = 0;
        store.upsert_area(&stale).await.unwrap();

        assert_eq!(store.get_area("a1").await.unwrap().unwrap().store_count, 3);
    }
}
