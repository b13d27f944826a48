//! Content-derived identities for areas and stores.
//!
//! An identity is the SHA-256 of the owning scope, the normalized name and
//! the coordinate bucket. Readings from different providers that land in the
//! same bucket share an identity.

use sha2::{Digest, Sha256};

use crate::models::Coordinates;

/// Default bucketing precision in decimal degrees (about 111 m).
pub const DEFAULT_COORDINATE_PRECISION: u32 = 3;

/// Trim, lowercase, and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Round a coordinate to `precision` decimal places as an integer bucket.
pub fn coordinate_bucket(value: f64, precision: u32) -> i64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() as i64
}

/// Computes identity keys at a fixed coordinate precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKeyer {
    precision: u32,
}

impl Default for IdentityKeyer {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATE_PRECISION)
    }
}

impl IdentityKeyer {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Identity key for an entity named `name` at `at`, owned by `scope`.
    pub fn key(&self, scope: &str, name: &str, at: Coordinates) -> String {
        let material = format!(
            "{}|{}|{}|{}",
            scope,
            normalize_name(name),
            coordinate_bucket(at.latitude, self.precision),
            coordinate_bucket(at.longitude, self.precision),
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        hex::encode(hasher.finalize())
    }
}
