//! Diesel-backed SQLite entity store.
//!
//! Lists are stored as JSON text and timestamps as RFC 3339 text. Upserts
//! use `ON CONFLICT(id) DO UPDATE` so a row keeps its original `created_at`.
//! An existing area's `store_count` is only changed by `set_store_count`.

use std::path::Path;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable, Text};
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::debug;

use super::pool::{with_conn, SqlitePool};
use super::schema::{areas, stores, CREATE_TABLES};
use super::{parse_datetime, EntityStore, StoreError, StoreResult};
use crate::models::{AreaKind, AreaRecord, Coordinates, StoreCategory, StoreRecord};

const UPSERT_AREA: &str = "INSERT INTO areas (id, city_id, name, kind, tier, longitude, latitude, \
     hot_value, avg_consumption, customer_flow, store_count, rating, address, description, \
     facilities, transportation, tags, sources, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET \
     city_id = excluded.city_id, name = excluded.name, kind = excluded.kind, \
     tier = excluded.tier, longitude = excluded.longitude, latitude = excluded.latitude, \
     hot_value = excluded.hot_value, avg_consumption = excluded.avg_consumption, \
     customer_flow = excluded.customer_flow, \
     rating = excluded.rating, address = excluded.address, description = excluded.description, \
     facilities = excluded.facilities, transportation = excluded.transportation, \
     tags = excluded.tags, sources = excluded.sources, updated_at = excluded.updated_at";

const UPSERT_STORE: &str = "INSERT INTO stores (id, area_id, name, category, sub_category, \
     longitude, latitude, rating, review_count, avg_price, phone, address, opening_hours, \
     description, facilities, tags, recommended, sources, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET \
     area_id = excluded.area_id, name = excluded.name, category = excluded.category, \
     sub_category = excluded.sub_category, longitude = excluded.longitude, \
     latitude = excluded.latitude, rating = excluded.rating, \
     review_count = excluded.review_count, avg_price = excluded.avg_price, \
     phone = excluded.phone, address = excluded.address, \
     opening_hours = excluded.opening_hours, description = excluded.description, \
     facilities = excluded.facilities, tags = excluded.tags, \
     recommended = excluded.recommended, sources = excluded.sources, \
     updated_at = excluded.updated_at";

/// Area row from the database.
#[derive(Queryable, Debug, Clone)]
struct AreaRow {
    id: String,
    city_id: String,
    name: String,
    kind: String,
    tier: Option<String>,
    longitude: f64,
    latitude: f64,
    hot_value: i64,
    avg_consumption: Option<f64>,
    customer_flow: Option<i64>,
    store_count: i64,
    rating: f64,
    address: Option<String>,
    description: Option<String>,
    facilities: String,
    transportation: String,
    tags: String,
    sources: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AreaRow> for AreaRecord {
    type Error = StoreError;

    fn try_from(row: AreaRow) -> Result<Self, Self::Error> {
        Ok(AreaRecord {
            id: row.id,
            city_id: row.city_id,
            name: row.name,
            kind: AreaKind::from_str(&row.kind).unwrap_or_default(),
            tier: row.tier,
            coordinates: Coordinates::new(row.longitude, row.latitude),
            hot_value: row.hot_value,
            avg_consumption: row.avg_consumption,
            customer_flow: row.customer_flow,
            store_count: row.store_count,
            rating: row.rating,
            address: row.address,
            description: row.description,
            facilities: serde_json::from_str(&row.facilities)?,
            transportation: serde_json::from_str(&row.transportation)?,
            tags: serde_json::from_str(&row.tags)?,
            sources: serde_json::from_str(&row.sources)?,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        })
    }
}

/// Store row from the database.
#[derive(Queryable, Debug, Clone)]
struct StoreRow {
    id: String,
    area_id: String,
    name: String,
    category: String,
    sub_category: Option<String>,
    longitude: f64,
    latitude: f64,
    rating: f64,
    review_count: i64,
    avg_price: Option<f64>,
    phone: Option<String>,
    address: Option<String>,
    opening_hours: Option<String>,
    description: Option<String>,
    facilities: String,
    tags: String,
    recommended: i32,
    sources: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<StoreRow> for StoreRecord {
    type Error = StoreError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(StoreRecord {
            id: row.id,
            area_id: row.area_id,
            name: row.name,
            category: StoreCategory::from_str(&row.category).unwrap_or_default(),
            sub_category: row.sub_category,
            coordinates: Coordinates::new(row.longitude, row.latitude),
            rating: row.rating,
            review_count: row.review_count,
            avg_price: row.avg_price,
            phone: row.phone,
            address: row.address,
            opening_hours: row.opening_hours,
            description: row.description,
            facilities: serde_json::from_str(&row.facilities)?,
            tags: serde_json::from_str(&row.tags)?,
            recommended: row.recommended != 0,
            sources: serde_json::from_str(&row.sources)?,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        })
    }
}

/// SQLite entity store.
#[derive(Debug, Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Open a store and create its tables if needed.
    pub async fn open(database_url: &str) -> StoreResult<Self> {
        let store = Self {
            pool: SqlitePool::new(database_url),
        };
        store.init().await?;
        Ok(store)
    }

    /// Open a store backed by a file path.
    pub async fn open_path(path: &Path) -> StoreResult<Self> {
        Self::open(&path.display().to_string()).await
    }

    /// Create tables and indexes.
    pub async fn init(&self) -> StoreResult<()> {
        with_conn!(self.pool, conn, {
            conn.batch_execute("PRAGMA journal_mode = WAL;").await?;
            conn.batch_execute(CREATE_TABLES).await?;
            debug!("Schema ready at {}", self.pool.database_url());
            Ok(())
        })
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn get_area(&self, id: &str) -> StoreResult<Option<AreaRecord>> {
        let row = with_conn!(self.pool, conn, {
            areas::table
                .find(id)
                .first::<AreaRow>(&mut conn)
                .await
                .optional()?
        });
        row.map(AreaRecord::try_from).transpose()
    }

    async fn get_store(&self, id: &str) -> StoreResult<Option<StoreRecord>> {
        let row = with_conn!(self.pool, conn, {
            stores::table
                .find(id)
                .first::<StoreRow>(&mut conn)
                .await
                .optional()?
        });
        row.map(StoreRecord::try_from).transpose()
    }

    async fn upsert_area(&self, area: &AreaRecord) -> StoreResult<()> {
        let facilities = serde_json::to_string(&area.facilities)?;
        let transportation = serde_json::to_string(&area.transportation)?;
        let tags = serde_json::to_string(&area.tags)?;
        let sources = serde_json::to_string(&area.sources)?;
        let created_at = area.created_at.to_rfc3339();
        let updated_at = area.updated_at.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::sql_query(UPSERT_AREA)
                .bind::<Text, _>(&area.id)
                .bind::<Text, _>(&area.city_id)
                .bind::<Text, _>(&area.name)
                .bind::<Text, _>(area.kind.as_str())
                .bind::<Nullable<Text>, _>(area.tier.as_deref())
                .bind::<Double, _>(area.coordinates.longitude)
                .bind::<Double, _>(area.coordinates.latitude)
                .bind::<BigInt, _>(area.hot_value)
                .bind::<Nullable<Double>, _>(area.avg_consumption)
                .bind::<Nullable<BigInt>, _>(area.customer_flow)
                .bind::<BigInt, _>(area.store_count)
                .bind::<Double, _>(area.rating)
                .bind::<Nullable<Text>, _>(area.address.as_deref())
                .bind::<Nullable<Text>, _>(area.description.as_deref())
                .bind::<Text, _>(&facilities)
                .bind::<Text, _>(&transportation)
                .bind::<Text, _>(&tags)
                .bind::<Text, _>(&sources)
                .bind::<Text, _>(&created_at)
                .bind::<Text, _>(&updated_at)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn upsert_store(&self, store: &StoreRecord) -> StoreResult<()> {
        let facilities = serde_json::to_string(&store.facilities)?;
        let tags = serde_json::to_string(&store.tags)?;
        let sources = serde_json::to_string(&store.sources)?;
        let created_at = store.created_at.to_rfc3339();
        let updated_at = store.updated_at.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::sql_query(UPSERT_STORE)
                .bind::<Text, _>(&store.id)
                .bind::<Text, _>(&store.area_id)
                .bind::<Text, _>(&store.name)
                .bind::<Text, _>(store.category.as_str())
                .bind::<Nullable<Text>, _>(store.sub_category.as_deref())
                .bind::<Double, _>(store.coordinates.longitude)
                .bind::<Double, _>(store.coordinates.latitude)
                .bind::<Double, _>(store.rating)
                .bind::<BigInt, _>(store.review_count)
                .bind::<Nullable<Double>, _>(store.avg_price)
                .bind::<Nullable<Text>, _>(store.phone.as_deref())
                .bind::<Nullable<Text>, _>(store.address.as_deref())
                .bind::<Nullable<Text>, _>(store.opening_hours.as_deref())
                .bind::<Nullable<Text>, _>(store.description.as_deref())
                .bind::<Text, _>(&facilities)
                .bind::<Text, _>(&tags)
                .bind::<Integer, _>(i32::from(store.recommended))
                .bind::<Text, _>(&sources)
                .bind::<Text, _>(&created_at)
                .bind::<Text, _>(&updated_at)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn list_areas_by_city(&self, city_id: &str) -> StoreResult<Vec<AreaRecord>> {
        let rows = with_conn!(self.pool, conn, {
            areas::table
                .filter(areas::city_id.eq(city_id))
                .order((areas::name.asc(), areas::id.asc()))
                .load::<AreaRow>(&mut conn)
                .await?
        });
        rows.into_iter().map(AreaRecord::try_from).collect()
    }

    async fn list_stores_by_area(&self, area_id: &str) -> StoreResult<Vec<StoreRecord>> {
        let rows = with_conn!(self.pool, conn, {
            stores::table
                .filter(stores::area_id.eq(area_id))
                .order((stores::name.asc(), stores::id.asc()))
                .load::<StoreRow>(&mut conn)
                .await?
        });
        rows.into_iter().map(StoreRecord::try_from).collect()
    }

    async fn set_store_count(&self, area_id: &str, count: i64) -> StoreResult<()> {
        with_conn!(self.pool, conn, {
            diesel::update(areas::table.find(area_id))
                .set(areas::store_count.eq(count))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }
}
