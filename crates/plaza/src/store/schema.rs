//! Database tables.

diesel::table! {
    areas (id) {
        id -> Text,
        city_id -> Text,
        name -> Text,
        kind -> Text,
        tier -> Nullable<Text>,
        longitude -> Double,
        latitude -> Double,
        hot_value -> BigInt,
        avg_consumption -> Nullable<Double>,
        customer_flow -> Nullable<BigInt>,
        store_count -> BigInt,
        rating -> Double,
        address -> Nullable<Text>,
        description -> Nullable<Text>,
        facilities -> Text,
        transportation -> Text,
        tags -> Text,
        sources -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    stores (id) {
        id -> Text,
        area_id -> Text,
        name -> Text,
        category -> Text,
        sub_category -> Nullable<Text>,
        longitude -> Double,
        latitude -> Double,
        rating -> Double,
        review_count -> BigInt,
        avg_price -> Nullable<Double>,
        phone -> Nullable<Text>,
        address -> Nullable<Text>,
        opening_hours -> Nullable<Text>,
        description -> Nullable<Text>,
        facilities -> Text,
        tags -> Text,
        recommended -> Integer,
        sources -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

/// Schema bootstrap, safe to run on every start.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS areas (
    id TEXT PRIMARY KEY NOT NULL,
    city_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    tier TEXT,
    longitude DOUBLE NOT NULL,
    latitude DOUBLE NOT NULL,
    hot_value BIGINT NOT NULL DEFAULT 0,
    avg_consumption DOUBLE,
    customer_flow BIGINT,
    store_count BIGINT NOT NULL DEFAULT 0,
    rating DOUBLE NOT NULL DEFAULT 0,
    address TEXT,
    description TEXT,
    facilities TEXT NOT NULL DEFAULT '[]',
    transportation TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    sources TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_areas_city ON areas(city_id);

CREATE TABLE IF NOT EXISTS stores (
    id TEXT PRIMARY KEY NOT NULL,
    area_id TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    sub_category TEXT,
    longitude DOUBLE NOT NULL,
    latitude DOUBLE NOT NULL,
    rating DOUBLE NOT NULL DEFAULT 0,
    review_count BIGINT NOT NULL DEFAULT 0,
    avg_price DOUBLE,
    phone TEXT,
    address TEXT,
    opening_hours TEXT,
    description TEXT,
    facilities TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    recommended INTEGER NOT NULL DEFAULT 0,
    sources TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stores_area ON stores(area_id);
"#;
