//! Provider adapters: the uniform capability every data provider exposes.
//!
//! The aggregator never branches on provider names; a new provider is added
//! by implementing [`SourceAdapter`] and registering it.

mod registry;
mod retry;

pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Coordinates, RawArea, RawStore};

/// Default search radius around an area when fetching its stores.
pub const DEFAULT_STORE_RADIUS_METERS: u32 = 1000;

/// Error type for adapter calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Adapter task failed: {0}")]
    Panicked(String),
}

impl AdapterError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Transport(_)
                | AdapterError::Timeout(_)
                | AdapterError::RateLimited(_)
                | AdapterError::Unavailable(_)
        )
    }
}

/// City-level fetch target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityScope {
    pub city_id: String,
    pub city_name: String,
}

impl CityScope {
    pub fn new(city_id: &str, city_name: &str) -> Self {
        Self {
            city_id: city_id.to_string(),
            city_name: city_name.to_string(),
        }
    }
}

/// Neighbourhood of one persisted area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaScope {
    pub area_id: String,
    pub area_name: String,
    pub city_id: String,
    pub coordinates: Coordinates,
    pub radius_meters: u32,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub healthy: bool,
    pub message: String,
}

impl ProbeReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// A data provider.
///
/// Calls retry transient failures internally before returning an error.
/// "No results" is an empty vector, never an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable provider name used for selection, provenance, and error records.
    fn name(&self) -> &str;

    /// Raw district observations for a city.
    async fn fetch_areas(&self, city: &CityScope) -> Result<Vec<RawArea>, AdapterError>;

    /// Raw merchant observations around an area.
    async fn fetch_stores(&self, area: &AreaScope) -> Result<Vec<RawStore>, AdapterError>;

    /// Check that the provider is reachable.
    async fn probe(&self) -> ProbeReport {
        ProbeReport::ok("no probe implemented")
    }
}
