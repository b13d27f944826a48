//! Raw observations as reported by a single provider.
//!
//! Every field is optional: providers disagree on what they know, and the
//! merge engine decides which observations are usable.

use serde::{Deserialize, Serialize};

use super::{AreaKind, Coordinates, StoreCategory};

/// One provider's view of a commercial district.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArea {
    pub name: Option<String>,
    pub kind: Option<AreaKind>,
    pub tier: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub hot_value: Option<i64>,
    pub avg_consumption: Option<f64>,
    pub customer_flow: Option<i64>,
    pub store_count: Option<i64>,
    pub rating: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub transportation: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Providers behind this observation.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl RawArea {
    pub fn new(source: &str, name: &str, coordinates: Coordinates) -> Self {
        Self {
            name: Some(name.to_string()),
            coordinates: Some(coordinates),
            sources: vec![source.to_string()],
            ..Default::default()
        }
    }

    pub fn with_hot_value(mut self, hot_value: i64) -> Self {
        self.hot_value = Some(hot_value);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_kind(mut self, kind: AreaKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// One provider's view of a merchant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStore {
    pub name: Option<String>,
    pub category: Option<StoreCategory>,
    pub sub_category: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub avg_price: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub recommended: Option<bool>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl RawStore {
    pub fn new(source: &str, name: &str, coordinates: Coordinates) -> Self {
        Self {
            name: Some(name.to_string()),
            coordinates: Some(coordinates),
            sources: vec![source.to_string()],
            ..Default::default()
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_review_count(mut self, review_count: i64) -> Self {
        self.review_count = Some(review_count);
        self
    }

    pub fn with_category(mut self, category: StoreCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}
