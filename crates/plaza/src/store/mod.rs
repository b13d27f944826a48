//! Persistence for canonical areas and stores.
//!
//! The aggregation engine only talks to [`EntityStore`]. Upserts are keyed by
//! identity so overlapping runs can never duplicate an entity.

mod memory;
pub mod pool;
mod schema;
mod sqlite;

pub use memory::InMemoryEntityStore;
pub use sqlite::SqliteEntityStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AreaRecord, StoreRecord};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from persistence backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Storage for canonical records.
///
/// Implementations must be thread-safe; an upsert of one entity is atomic.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_area(&self, id: &str) -> StoreResult<Option<AreaRecord>>;

    async fn get_store(&self, id: &str) -> StoreResult<Option<StoreRecord>>;

    /// Insert or update an area. An existing row keeps its `created_at`.
    async fn upsert_area(&self, area: &AreaRecord) -> StoreResult<()>;

    /// Insert or update a store. An existing row keeps its `created_at`.
    async fn upsert_store(&self, store: &StoreRecord) -> StoreResult<()>;

    /// All areas of a city, ordered by name.
    async fn list_areas_by_city(&self, city_id: &str) -> StoreResult<Vec<AreaRecord>>;

    /// All stores of an area, ordered by name.
    async fn list_stores_by_area(&self, area_id: &str) -> StoreResult<Vec<StoreRecord>>;

    /// Record the number of stores persisted for an area.
    async fn set_store_count(&self, area_id: &str, count: i64) -> StoreResult<()>;
}

/// Parse a datetime string from the database.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
