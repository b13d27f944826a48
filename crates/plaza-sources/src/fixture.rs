//! Provider backed by a local JSON or YAML file.
//!
//! ```yaml
//! areas:
//!   hz:
//!     - name: West Lake
//!       location: "120.15,30.25"
//! stores:
//!   West Lake:
//!     - name: Noodle Bar
//!       location: "120.151,30.251"
//!   "*": []
//! ```
//!
//! Areas are keyed by city id. Stores are keyed by area name or area id,
//! with `*` as the fallback for areas that have no entry of their own.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use plaza::models::{RawArea, RawStore};
use plaza::sources::ProbeReport;
use plaza::{AdapterError, AreaScope, CityScope, SourceAdapter};

use crate::wire::{WireArea, WireStore};
use crate::BuildError;

const ANY_AREA: &str = "*";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixtureFile {
    areas: HashMap<String, Vec<WireArea>>,
    stores: HashMap<String, Vec<WireStore>>,
}

pub struct FixtureSourceAdapter {
    name: String,
    areas: HashMap<String, Vec<RawArea>>,
    stores: HashMap<String, Vec<RawStore>>,
}

impl FixtureSourceAdapter {
    /// Read a fixture file; `.yaml`/`.yml` is YAML, anything else JSON.
    pub async fn load(name: &str, path: &Path) -> Result<Self, BuildError> {
        let fixture_error = |message: String| BuildError::Fixture {
            provider: name.to_string(),
            message,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fixture_error(format!("{}: {}", path.display(), e)))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let file: FixtureFile = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| fixture_error(format!("{}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| fixture_error(format!("{}: {}", path.display(), e)))?
        };

        let adapter = Self::from_file(name, file);
        debug!(
            "Loaded fixture {} from {}: {} cities, {} store groups",
            name,
            path.display(),
            adapter.areas.len(),
            adapter.stores.len()
        );
        Ok(adapter)
    }

    fn from_file(name: &str, file: FixtureFile) -> Self {
        let areas = file
            .areas
            .into_iter()
            .map(|(city, areas)| (city, areas.into_iter().map(|a| a.into_raw(name)).collect()))
            .collect();
        let stores = file
            .stores
            .into_iter()
            .map(|(area, stores)| (area, stores.into_iter().map(|s| s.into_raw(name)).collect()))
            .collect();

        Self {
            name: name.to_string(),
            areas,
            stores,
        }
    }
}

#[async_trait]
impl SourceAdapter for FixtureSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_areas(&self, city: &CityScope) -> Result<Vec<RawArea>, AdapterError> {
        Ok(self.areas.get(&city.city_id).cloned().unwrap_or_default())
    }

    async fn fetch_stores(&self, area: &AreaScope) -> Result<Vec<RawStore>, AdapterError> {
        let stores = self
            .stores
            .get(&area.area_name)
            .or_else(|| self.stores.get(&area.area_id))
            .or_else(|| self.stores.get(ANY_AREA));
        Ok(stores.cloned().unwrap_or_default())
    }

    async fn probe(&self) -> ProbeReport {
        let areas: usize = self.areas.values().map(Vec::len).sum();
        ProbeReport::ok(format!("fixture with {} areas", areas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza::models::Coordinates;
    use std::io::Write;

    const YAML: &str = r#"
areas:
  hz:
    - name: West Lake
      location: "120.15,30.25"
      hot_value: 91
    - name: Wulin
      lng: 120.16
      lat: 30.27
stores:
  West Lake:
    - name: Noodle Bar
      location: "120.151,30.251"
      reviewCount: "120"
  "*":
    - name: Corner Shop
      lng: 120.0
      lat: 30.0
"#;

    fn write_fixture(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn scope(id: &str, name: &str) -> AreaScope {
        AreaScope {
            area_id: id.to_string(),
            area_name: name.to_string(),
            city_id: "hz".to_string(),
            coordinates: Coordinates::new(120.15, 30.25),
            radius_meters: 1000,
        }
    }

    #[tokio::test]
    async fn serves_areas_by_city() {
        let file = write_fixture(".yaml", YAML);
        let adapter = FixtureSourceAdapter::load("local", file.path()).await.unwrap();

        let areas = adapter
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].hot_value, Some(91));
        assert_eq!(areas[0].sources, vec!["local".to_string()]);

        let none = adapter
            .fetch_areas(&CityScope::new("sh", "Shanghai"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn stores_fall_back_to_wildcard() {
        let file = write_fixture(".yml", YAML);
        let adapter = FixtureSourceAdapter::load("local", file.path()).await.unwrap();

        let own = adapter.fetch_stores(&scope("a1", "West Lake")).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].review_count, Some(120));

        let fallback = adapter.fetch_stores(&scope("a2", "Wulin")).await.unwrap();
        assert_eq!(fallback[0].name.as_deref(), Some("Corner Shop"));
    }

    #[tokio::test]
    async fn reads_json_fixtures() {
        let file = write_fixture(
            ".json",
            r#"{"areas": {"sh": [{"name": "Bund", "location": "121.49,31.24"}]}}"#,
        );
        let adapter = FixtureSourceAdapter::load("local", file.path()).await.unwrap();

        let areas = adapter
            .fetch_areas(&CityScope::new("sh", "Shanghai"))
            .await
            .unwrap();
        assert_eq!(areas.len(), 1);
        assert!(adapter
            .fetch_stores(&scope("a1", "Bund"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_or_malformed_file_is_an_error() {
        let missing =
            FixtureSourceAdapter::load("local", Path::new("/nonexistent/plaza.yaml")).await;
        assert!(matches!(missing, Err(BuildError::Fixture { .. })));

        let file = write_fixture(".json", "{ not json");
        let malformed = FixtureSourceAdapter::load("local", file.path()).await;
        assert!(matches!(malformed, Err(BuildError::Fixture { .. })));
    }
}
