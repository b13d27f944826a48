//! Commercial district models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{classify_by_keywords, Coordinates, RawArea};

/// Kind of commercial district.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Shopping,
    Dining,
    Entertainment,
    #[default]
    Mixed,
}

const AREA_KEYWORDS: &[(&[&str], AreaKind)] = &[
    (
        &["shopping", "mall", "plaza", "department", "购物", "商场", "百货"],
        AreaKind::Shopping,
    ),
    (
        &["dining", "food", "restaurant", "snack", "美食", "餐饮", "小吃"],
        AreaKind::Dining,
    ),
    (
        &["entertainment", "leisure", "bar", "娱乐", "休闲", "酒吧"],
        AreaKind::Entertainment,
    ),
];

impl AreaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shopping => "shopping",
            Self::Dining => "dining",
            Self::Entertainment => "entertainment",
            Self::Mixed => "mixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "shopping" => Some(Self::Shopping),
            "dining" => Some(Self::Dining),
            "entertainment" => Some(Self::Entertainment),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Lenient mapping from free text (provider type labels or names).
    pub fn classify(text: &str) -> Self {
        Self::from_str(text.trim())
            .or_else(|| classify_by_keywords(text, AREA_KEYWORDS))
            .unwrap_or_default()
    }
}

/// A canonical commercial district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: String,
    pub city_id: String,
    pub name: String,
    pub kind: AreaKind,
    /// Tier label, `A` through `D` in practice.
    pub tier: Option<String>,
    pub coordinates: Coordinates,
    pub hot_value: i64,
    pub avg_consumption: Option<f64>,
    pub customer_flow: Option<i64>,
    pub store_count: i64,
    pub rating: f64,
    pub address: Option<String>,
    pub description: Option<String>,
    pub facilities: Vec<String>,
    pub transportation: Vec<String>,
    pub tags: Vec<String>,
    /// Providers that contributed to the latest canonical version.
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AreaRecord {
    /// Build a new record from a canonical observation.
    ///
    /// Returns `None` when the observation lacks a name or position.
    pub fn from_observation(
        id: String,
        city_id: &str,
        raw: RawArea,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let name = raw.name?;
        let coordinates = raw.coordinates?;
        Some(Self {
            id,
            city_id: city_id.to_string(),
            name,
            kind: raw.kind.unwrap_or_default(),
            tier: raw.tier,
            coordinates,
            hot_value: raw.hot_value.unwrap_or(0),
            avg_consumption: raw.avg_consumption,
            customer_flow: raw.customer_flow,
            store_count: raw.store_count.unwrap_or(0),
            rating: raw.rating.unwrap_or(0.0),
            address: raw.address,
            description: raw.description,
            facilities: raw.facilities,
            transportation: raw.transportation,
            tags: raw.tags,
            sources: raw.sources,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite mutable fields with the values present in `raw`.
    ///
    /// Identity, `created_at` and `store_count` are left alone; fields the
    /// observation does not carry keep their stored value.
    pub fn apply(&mut self, raw: RawArea, now: DateTime<Utc>) {
        if let Some(name) = raw.name {
            self.name = name;
        }
        if let Some(kind) = raw.kind {
            self.kind = kind;
        }
        if raw.tier.is_some() {
            self.tier = raw.tier;
        }
        if let Some(coordinates) = raw.coordinates {
            self.coordinates = coordinates;
        }
        if let Some(hot_value) = raw.hot_value {
            self.hot_value = hot_value;
        }
        if raw.avg_consumption.is_some() {
            self.avg_consumption = raw.avg_consumption;
        }
        if raw.customer_flow.is_some() {
            self.customer_flow = raw.customer_flow;
        }
        if let Some(rating) = raw.rating {
            self.rating = rating;
        }
        if raw.address.is_some() {
            self.address = raw.address;
        }
        if raw.description.is_some() {
            self.description = raw.description;
        }
        if !raw.facilities.is_empty() {
            self.facilities = raw.facilities;
        }
        if !raw.transportation.is_empty() {
            self.transportation = raw.transportation;
        }
        if !raw.tags.is_empty() {
            self.tags = raw.tags;
        }
        if !raw.sources.is_empty() {
            self.sources = raw.sources;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_area_kind() {
        assert_eq!(AreaKind::classify("dining"), AreaKind::Dining);
        assert_eq!(AreaKind::classify("Riverside Mall"), AreaKind::Shopping);
        assert_eq!(AreaKind::classify("Harbour Bar Street"), AreaKind::Entertainment);
        assert_eq!(AreaKind::classify("Old Town"), AreaKind::Mixed);
    }

    #[test]
    fn apply_keeps_stored_values_for_missing_fields() {
        let t0 = DateTime::UNIX_EPOCH;
        let raw = RawArea::new("a", "Old Town", Coordinates::new(120.2, 30.1))
            .with_hot_value(70)
            .with_description("historic core");
        let mut record = AreaRecord::from_observation("id".into(), "hz", raw, t0).unwrap();
        record.store_count = 12;

        let later = t0 + chrono::Duration::days(1);
        let update =
            RawArea::new("b", "Old Town", Coordinates::new(120.2, 30.1)).with_hot_value(75);
        record.apply(update, later);

        assert_eq!(record.hot_value, 75);
        assert_eq!(record.description.as_deref(), Some("historic core"));
        assert_eq!(record.store_count, 12);
        assert_eq!(record.created_at, t0);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.sources, vec!["b".to_string()]);
    }
}
