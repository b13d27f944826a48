//! Lenient decoding of provider payloads into raw observations.
//!
//! Providers disagree on field names, send numbers as strings, and wrap
//! lists in different envelopes. Everything here degrades to `None` rather
//! than failing the whole response.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use plaza::models::{AreaKind, Coordinates, RawArea, RawStore, StoreCategory};

/// Trim and flatten line breaks and tabs into spaces.
pub fn clean_text(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

fn clean_opt(text: Option<String>) -> Option<String> {
    text.map(|t| clean_text(&t)).filter(|t| !t.is_empty())
}

fn number(value: &Option<Value>) -> Option<f64> {
    let parsed: Option<f64> = match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn integer(value: &Option<Value>) -> Option<i64> {
    number(value).map(|n| n.round() as i64)
}

fn flag(value: &Option<Value>) -> Option<bool> {
    match value.as_ref()? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A list of strings, a `;`/`|`/`,`-separated string, or a list of objects
/// with a `name` field.
fn strings(value: &Option<Value>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let items: Vec<String> = match value {
        Value::String(s) => s
            .split(|c| matches!(c, ';' | '|' | ','))
            .map(clean_text)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(clean_text(s)),
                Value::Object(map) => map
                    .get("name")
                    .or_else(|| map.get("type"))
                    .and_then(Value::as_str)
                    .map(clean_text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    let mut unique = Vec::with_capacity(items.len());
    for item in items.into_iter().filter(|s| !s.is_empty()) {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// Strings as-is, numbers stringified, anything else (`[]`, objects) absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Position from explicit fields or a `"lng,lat"` location string.
fn position(
    longitude: &Option<Value>,
    latitude: &Option<Value>,
    location: &Option<String>,
) -> Option<Coordinates> {
    if let (Some(lng), Some(lat)) = (number(longitude), number(latitude)) {
        return Some(Coordinates::new(lng, lat));
    }
    let (lng, lat) = location.as_deref()?.split_once(',')?;
    Some(Coordinates::new(
        lng.trim().parse().ok()?,
        lat.trim().parse().ok()?,
    ))
}

/// One district as a provider reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireArea {
    #[serde(alias = "title", deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(
        alias = "type",
        alias = "area_type",
        alias = "category",
        deserialize_with = "lenient_text"
    )]
    pub kind: Option<String>,
    #[serde(alias = "level", deserialize_with = "lenient_text")]
    pub tier: Option<String>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<Value>,
    #[serde(alias = "lat")]
    pub latitude: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(alias = "hotValue", alias = "heat")]
    pub hot_value: Option<Value>,
    #[serde(alias = "avgConsumption", alias = "avg_price")]
    pub avg_consumption: Option<Value>,
    #[serde(alias = "customerFlow")]
    pub customer_flow: Option<Value>,
    #[serde(alias = "storeCount")]
    pub store_count: Option<Value>,
    #[serde(alias = "score")]
    pub rating: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(alias = "intro", deserialize_with = "lenient_text")]
    pub description: Option<String>,
    pub facilities: Option<Value>,
    pub transportation: Option<Value>,
    #[serde(alias = "keywords")]
    pub tags: Option<Value>,
}

impl WireArea {
    pub fn into_raw(self, source: &str) -> RawArea {
        let kind = self.kind.as_deref().map(AreaKind::classify);
        let kind = match (kind, self.name.as_deref()) {
            (Some(AreaKind::Mixed), Some(name)) | (None, Some(name)) => {
                Some(AreaKind::classify(name))
            }
            (kind, _) => kind,
        };
        RawArea {
            coordinates: position(&self.longitude, &self.latitude, &self.location),
            hot_value: integer(&self.hot_value),
            avg_consumption: number(&self.avg_consumption),
            customer_flow: integer(&self.customer_flow),
            store_count: integer(&self.store_count),
            rating: number(&self.rating),
            facilities: strings(&self.facilities),
            transportation: strings(&self.transportation),
            tags: strings(&self.tags),
            name: clean_opt(self.name),
            kind,
            tier: clean_opt(self.tier),
            address: clean_opt(self.address),
            description: clean_opt(self.description),
            sources: vec![source.to_string()],
        }
    }
}

/// One merchant as a provider reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireStore {
    #[serde(alias = "title", deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(alias = "type", deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(
        alias = "subCategory",
        alias = "sub_type",
        deserialize_with = "lenient_text"
    )]
    pub sub_category: Option<String>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<Value>,
    #[serde(alias = "lat")]
    pub latitude: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(alias = "score")]
    pub rating: Option<Value>,
    #[serde(alias = "reviewCount", alias = "comment_num")]
    pub review_count: Option<Value>,
    #[serde(alias = "avgPrice", alias = "cost")]
    pub avg_price: Option<Value>,
    #[serde(alias = "tel", deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(
        alias = "openingHours",
        alias = "business_hours",
        deserialize_with = "lenient_text"
    )]
    pub opening_hours: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    pub facilities: Option<Value>,
    #[serde(alias = "keywords")]
    pub tags: Option<Value>,
    #[serde(alias = "is_recommended", alias = "isRecommended")]
    pub recommended: Option<Value>,
}

impl WireStore {
    pub fn into_raw(self, source: &str) -> RawStore {
        let category = self
            .category
            .as_deref()
            .map(StoreCategory::classify)
            .or_else(|| self.name.as_deref().map(StoreCategory::classify));
        RawStore {
            coordinates: position(&self.longitude, &self.latitude, &self.location),
            rating: number(&self.rating),
            review_count: integer(&self.review_count),
            avg_price: number(&self.avg_price),
            facilities: strings(&self.facilities),
            tags: strings(&self.tags),
            recommended: flag(&self.recommended),
            name: clean_opt(self.name),
            category,
            sub_category: clean_opt(self.sub_category),
            phone: clean_opt(self.phone),
            address: clean_opt(self.address),
            opening_hours: clean_opt(self.opening_hours),
            description: clean_opt(self.description),
            sources: vec![source.to_string()],
        }
    }
}

/// Response bodies: a bare list, or a list under a well-known key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    List(Vec<T>),
    Wrapped {
        #[serde(alias = "areas", alias = "stores", alias = "pois", alias = "results")]
        data: Vec<T>,
    },
}

impl<T> Envelope<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Envelope::List(items) => items,
            Envelope::Wrapped { data } => data,
        }
    }
}

/// Decode an area response body.
pub fn decode_areas(body: Value, source: &str) -> Result<Vec<RawArea>, serde_json::Error> {
    let envelope: Envelope<WireArea> = serde_json::from_value(body)?;
    Ok(envelope
        .into_items()
        .into_iter()
        .map(|a| a.into_raw(source))
        .collect())
}

/// Decode a store response body.
pub fn decode_stores(body: Value, source: &str) -> Result<Vec<RawStore>, serde_json::Error> {
    let envelope: Envelope<WireStore> = serde_json::from_value(body)?;
    Ok(envelope
        .into_items()
        .into_iter()
        .map(|s| s.into_raw(source))
        .collect())
}
