//! JSON-over-HTTP provider adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use plaza::config::ProviderConfig;
use plaza::models::{RawArea, RawStore};
use plaza::sources::{ProbeReport, RetryPolicy};
use plaza::{AdapterError, AreaScope, CityScope, SourceAdapter};

use crate::pacing::{Pacer, PacingConfig};
use crate::wire;
use crate::BuildError;

/// Default user agent for provider requests.
pub const USER_AGENT: &str = concat!("plaza/", env!("CARGO_PKG_VERSION"));

/// Adapter for a provider exposing area and store listings as JSON.
///
/// Areas are requested with `city_id` and `city` query parameters, stores
/// with `area_id`, `area`, `location` (`lng,lat`) and `radius`. The API key,
/// when configured, is sent as `key`.
pub struct HttpSourceAdapter {
    name: String,
    client: Client,
    base_url: Url,
    areas_url: Url,
    stores_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
    pacer: Pacer,
}

fn endpoint(provider: &str, base: &str, path: &str) -> Result<Url, BuildError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|source| BuildError::InvalidUrl {
        provider: provider.to_string(),
        url: joined,
        source,
    })
}

impl HttpSourceAdapter {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, BuildError> {
        let base = config
            .base_url
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| BuildError::MissingBaseUrl(config.name.clone()))?;

        let base_url = Url::parse(base).map_err(|source| BuildError::InvalidUrl {
            provider: config.name.clone(),
            url: base.to_string(),
            source,
        })?;
        let areas_url = endpoint(&config.name, base, &config.areas_path)?;
        let stores_url = endpoint(&config.name, base, &config.stores_path)?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_deref().unwrap_or(USER_AGENT))
            .timeout(config.timeout())
            .gzip(true)
            .build()
            .map_err(|source| BuildError::Client {
                provider: config.name.clone(),
                source,
            })?;

        let pacing = PacingConfig {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            ..PacingConfig::default()
        };

        Ok(Self {
            name: config.name.clone(),
            client,
            base_url,
            areas_url,
            stores_url,
            api_key: config.api_key(),
            retry: RetryPolicy::new(config.retry_attempts, config.retry_backoff()),
            pacer: Pacer::new(&config.name, pacing),
        })
    }

    /// Replace the pacing parameters.
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacer = Pacer::new(&self.name, pacing);
        self
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    fn with_key(&self, mut query: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        query
    }

    fn classify(&self, error: reqwest::Error) -> AdapterError {
        let message = format!("{}: {}", self.name, error);
        if error.is_timeout() {
            AdapterError::Timeout(message)
        } else if error.is_decode() {
            AdapterError::Protocol(message)
        } else {
            AdapterError::Transport(message)
        }
    }

    fn status_error(&self, status: StatusCode) -> AdapterError {
        let message = format!("{} returned HTTP {}", self.name, status.as_u16());
        match status.as_u16() {
            429 => AdapterError::RateLimited(message),
            500..=599 => AdapterError::Unavailable(message),
            _ => AdapterError::Protocol(message),
        }
    }

    /// One paced GET returning the decoded JSON body.
    async fn get_json(
        &self,
        url: &Url,
        query: &[(&'static str, String)],
    ) -> Result<Value, AdapterError> {
        self.pacer.wait().await;

        debug!("GET {} ({} params)", url, query.len());
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            if Pacer::is_rate_limit(status.as_u16()) {
                self.pacer.report_rate_limit(status.as_u16()).await;
            }
            return Err(self.status_error(status));
        }

        self.pacer.report_success().await;
        response.json::<Value>().await.map_err(|e| self.classify(e))
    }

    async fn fetch(
        &self,
        label: &str,
        url: &Url,
        query: Vec<(&'static str, String)>,
    ) -> Result<Value, AdapterError> {
        let query = self.with_key(query);
        let query = query.as_slice();
        self.retry.run(label, move || self.get_json(url, query)).await
    }
}

#[async_trait]
impl SourceAdapter for HttpSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_areas(&self, city: &CityScope) -> Result<Vec<RawArea>, AdapterError> {
        let label = format!("{} areas for {}", self.name, city.city_id);
        let query = vec![
            ("city_id", city.city_id.clone()),
            ("city", city.city_name.clone()),
        ];
        let body = self.fetch(&label, &self.areas_url, query).await?;
        wire::decode_areas(body, &self.name).map_err(|e| {
            AdapterError::Protocol(format!("{}: malformed area payload: {}", self.name, e))
        })
    }

    async fn fetch_stores(&self, area: &AreaScope) -> Result<Vec<RawStore>, AdapterError> {
        let label = format!("{} stores for {}", self.name, area.area_id);
        let query = vec![
            ("area_id", area.area_id.clone()),
            ("area", area.area_name.clone()),
            (
                "location",
                format!("{},{}", area.coordinates.longitude, area.coordinates.latitude),
            ),
            ("radius", area.radius_meters.to_string()),
        ];
        let body = self.fetch(&label, &self.stores_url, query).await?;
        wire::decode_stores(body, &self.name).map_err(|e| {
            AdapterError::Protocol(format!("{}: malformed store payload: {}", self.name, e))
        })
    }

    async fn probe(&self) -> ProbeReport {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                let message = format!("{} answered HTTP {}", self.base_url, status.as_u16());
                if status.is_server_error() {
                    ProbeReport::failed(message)
                } else {
                    ProbeReport::ok(message)
                }
            }
            Err(e) => ProbeReport::failed(self.classify(e).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use plaza::config::ProviderKind;
    use plaza::models::{Coordinates, StoreCategory};
    use serde_json::json;

    fn config(base_url: &str) -> ProviderConfig {
        let mut config = ProviderConfig::new("amap", ProviderKind::Http);
        config.base_url = Some(base_url.to_string());
        config.retry_attempts = 2;
        config.retry_backoff_ms = 1;
        config
    }

    fn quick_pacing() -> PacingConfig {
        PacingConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            ..PacingConfig::default()
        }
    }

    fn adapter(config: &ProviderConfig) -> HttpSourceAdapter {
        HttpSourceAdapter::from_config(config)
            .unwrap()
            .with_pacing(quick_pacing())
    }

    fn west_lake() -> AreaScope {
        AreaScope {
            area_id: "a1".to_string(),
            area_name: "West Lake".to_string(),
            city_id: "hz".to_string(),
            coordinates: Coordinates::new(120.15, 30.25),
            radius_meters: 800,
        }
    }

    #[tokio::test]
    async fn fetches_and_decodes_areas() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/areas")
                    .query_param("city_id", "hz")
                    .query_param("city", "Hangzhou")
                    .query_param("key", "secret");
                then.status(200).json_body(json!({
                    "data": [
                        {"name": " West Lake ", "location": "120.15,30.25", "hot_value": 91},
                        {"name": "Wulin", "lng": 120.16, "lat": 30.27, "type": "shopping"}
                    ]
                }));
            })
            .await;

        let mut config = config(&server.base_url());
        config.api_key = Some("secret".to_string());
        let areas = adapter(&config)
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].name.as_deref(), Some("West Lake"));
        assert_eq!(areas[0].sources, vec!["amap".to_string()]);
        assert_eq!(areas[0].hot_value, Some(91));
    }

    #[tokio::test]
    async fn fetches_stores_around_area() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/stores")
                    .query_param("area_id", "a1")
                    .query_param("location", "120.15,30.25")
                    .query_param("radius", "800");
                then.status(200).json_body(json!([
                    {"name": "Noodle Bar", "location": "120.151,30.251", "type": "餐饮服务;中餐厅"}
                ]));
            })
            .await;

        let mut config = config(&format!("{}/v3/", server.base_url()));
        config.stores_path = "stores".to_string();
        let stores = adapter(&config).fetch_stores(&west_lake()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].category, Some(StoreCategory::Restaurant));
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/areas");
                then.status(200).json_body(json!({"areas": []}));
            })
            .await;

        let areas = adapter(&config(&server.base_url()))
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap();
        assert!(areas.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_backs_off_and_reports() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/areas");
                then.status(429);
            })
            .await;

        let adapter = adapter(&config(&server.base_url()));
        let err = adapter
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::RateLimited(_)));
        assert_eq!(adapter.pacer().rate_limit_hits().await, 2);
        assert!(adapter.pacer().backoff().await > Duration::ZERO);
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/areas");
                then.status(502);
            })
            .await;

        let err = adapter(&config(&server.base_url()))
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable(_)));
    }

    #[tokio::test]
    async fn client_errors_and_bad_payloads_are_protocol_errors() {
        let server = MockServer::start_async().await;
        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/areas");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/stores");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let adapter = adapter(&config(&server.base_url()));
        let err = adapter
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
        missing.assert_async().await;

        let err = adapter.fetch_stores(&west_lake()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
    }

    #[tokio::test]
    async fn unexpected_shape_is_protocol_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/areas");
                then.status(200).json_body(json!({"status": "ok"}));
            })
            .await;

        let err = adapter(&config(&server.base_url()))
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let mut config = config("http://127.0.0.1:1");
        config.retry_attempts = 1;
        let adapter = adapter(&config);

        let err = adapter
            .fetch_areas(&CityScope::new("hz", "Hangzhou"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Transport(_)));
        assert!(!adapter.probe().await.healthy);
    }

    #[tokio::test]
    async fn probe_reports_reachable_provider() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200);
            })
            .await;

        let report = adapter(&config(&server.base_url())).probe().await;
        assert!(report.healthy);
        assert!(report.message.contains("200"));
    }

    #[test]
    fn missing_or_invalid_base_url_is_rejected() {
        let mut config = ProviderConfig::new("amap", ProviderKind::Http);
        assert!(matches!(
            HttpSourceAdapter::from_config(&config),
            Err(BuildError::MissingBaseUrl(_))
        ));

        config.base_url = Some("not a url".to_string());
        assert!(matches!(
            HttpSourceAdapter::from_config(&config),
            Err(BuildError::InvalidUrl { .. })
        ));
    }
}
