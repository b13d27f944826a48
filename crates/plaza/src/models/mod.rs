//! Data models for areas, stores, and raw provider observations.

mod area;
mod raw;
mod store;

pub use area::{AreaKind, AreaRecord};
pub use raw::{RawArea, RawStore};
pub use store::{StoreCategory, StoreRecord};

use serde::{Deserialize, Serialize};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Finite and inside the valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Returns the keyword table entry whose keywords appear in `text`.
fn classify_by_keywords<T: Copy>(text: &str, table: &[(&[&str], T)]) -> Option<T> {
    let lowered = text.to_lowercase();
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, value)| *value)
}
