//! Merchant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{classify_by_keywords, Coordinates, RawStore};

/// Merchant category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreCategory {
    Restaurant,
    Retail,
    Entertainment,
    #[default]
    Service,
}

const STORE_KEYWORDS: &[(&[&str], StoreCategory)] = &[
    (
        &["restaurant", "food", "dining", "cafe", "美食", "餐饮"],
        StoreCategory::Restaurant,
    ),
    (
        &["retail", "shop", "shopping", "boutique", "购物"],
        StoreCategory::Retail,
    ),
    (
        &["entertainment", "leisure", "cinema", "karaoke", "休闲娱乐", "景点"],
        StoreCategory::Entertainment,
    ),
];

impl StoreCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Retail => "retail",
            Self::Entertainment => "entertainment",
            Self::Service => "service",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "restaurant" => Some(Self::Restaurant),
            "retail" => Some(Self::Retail),
            "entertainment" => Some(Self::Entertainment),
            "service" => Some(Self::Service),
            _ => None,
        }
    }

    /// Lenient mapping from provider tags; unknown tags are services.
    pub fn classify(text: &str) -> Self {
        Self::from_str(text.trim())
            .or_else(|| classify_by_keywords(text, STORE_KEYWORDS))
            .unwrap_or_default()
    }
}

/// A canonical merchant inside an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub area_id: String,
    pub name: String,
    pub category: StoreCategory,
    pub sub_category: Option<String>,
    pub coordinates: Coordinates,
    pub rating: f64,
    pub review_count: i64,
    pub avg_price: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub description: Option<String>,
    pub facilities: Vec<String>,
    pub tags: Vec<String>,
    pub recommended: bool,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreRecord {
    /// Build a new record from a canonical observation.
    pub fn from_observation(
        id: String,
        area_id: &str,
        raw: RawStore,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let name = raw.name?;
        let coordinates = raw.coordinates?;
        Some(Self {
            id,
            area_id: area_id.to_string(),
            name,
            category: raw.category.unwrap_or_default(),
            sub_category: raw.sub_category,
            coordinates,
            rating: raw.rating.unwrap_or(0.0),
            review_count: raw.review_count.unwrap_or(0),
            avg_price: raw.avg_price,
            phone: raw.phone,
            address: raw.address,
            opening_hours: raw.opening_hours,
            description: raw.description,
            facilities: raw.facilities,
            tags: raw.tags,
            recommended: raw.recommended.unwrap_or(false),
            sources: raw.sources,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite mutable fields with the values present in `raw`.
    pub fn apply(&mut self, raw: RawStore, now: DateTime<Utc>) {
        if let Some(name) = raw.name {
            self.name = name;
        }
        if let Some(category) = raw.category {
            self.category = category;
        }
        if raw.sub_category.is_some() {
            self.sub_category = raw.sub_category;
        }
        if let Some(coordinates) = raw.coordinates {
            self.coordinates = coordinates;
        }
        if let Some(rating) = raw.rating {
            self.rating = rating;
        }
        if let Some(review_count) = raw.review_count {
            self.review_count = review_count;
        }
        if raw.avg_price.is_some() {
            self.avg_price = raw.avg_price;
        }
        if raw.phone.is_some() {
            self.phone = raw.phone;
        }
        if raw.address.is_some() {
            self.address = raw.address;
        }
        if raw.opening_hours.is_some() {
            self.opening_hours = raw.opening_hours;
        }
        if raw.description.is_some() {
            self.description = raw.description;
        }
        if !raw.facilities.is_empty() {
            self.facilities = raw.facilities;
        }
        if !raw.tags.is_empty() {
            self.tags = raw.tags;
        }
        if let Some(recommended) = raw.recommended {
            self.recommended = recommended;
        }
        if !raw.sources.is_empty() {
            self.sources = raw.sources;
        }
        self.updated_at = now;
    }
}
