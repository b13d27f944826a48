//! Concrete provider adapters for plaza.
//!
//! Providers are described in configuration and turned into registered
//! [`SourceAdapter`]s by [`build_registry`]. HTTP providers speak loosely
//! structured JSON; fixture providers read the same shapes from disk.

pub mod fixture;
pub mod http;
pub mod pacing;
pub mod wire;

pub use fixture::FixtureSourceAdapter;
pub use http::HttpSourceAdapter;
pub use pacing::{Pacer, PacingConfig};

use std::sync::Arc;

use tracing::{debug, info};

use plaza::config::{Config, ProviderConfig, ProviderKind};
use plaza::{AdapterRegistry, SourceAdapter};

/// Errors raised while turning provider configuration into adapters.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Provider '{0}' has no base_url")]
    MissingBaseUrl(String),

    #[error("Provider '{provider}' has an invalid URL '{url}': {source}")]
    InvalidUrl {
        provider: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Fixture provider '{0}' has no path")]
    MissingPath(String),

    #[error("Failed to build HTTP client for '{provider}': {source}")]
    Client {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to load fixture for '{provider}': {message}")]
    Fixture { provider: String, message: String },
}

/// Build one adapter from its configuration.
pub async fn build_adapter(
    config: &Config,
    provider: &ProviderConfig,
) -> Result<Arc<dyn SourceAdapter>, BuildError> {
    match provider.kind {
        ProviderKind::Http => Ok(Arc::new(HttpSourceAdapter::from_config(provider)?)),
        ProviderKind::Fixture => {
            let path = provider
                .path
                .as_deref()
                .ok_or_else(|| BuildError::MissingPath(provider.name.clone()))?;
            let path = config.resolve_path(path);
            Ok(Arc::new(
                FixtureSourceAdapter::load(&provider.name, &path).await?,
            ))
        }
    }
}

/// Register every enabled provider, in declaration order.
pub async fn build_registry(config: &Config) -> Result<AdapterRegistry, BuildError> {
    let mut registry = AdapterRegistry::new();
    for provider in &config.providers {
        if !provider.enabled {
            debug!("Skipping disabled provider {}", provider.name);
            continue;
        }
        registry.register(build_adapter(config, provider).await?);
    }
    info!(
        "Registered {} provider(s): {}",
        registry.len(),
        registry.names().join(", ")
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn http(name: &str, base_url: &str) -> ProviderConfig {
        let mut provider = ProviderConfig::new(name, ProviderKind::Http);
        provider.base_url = Some(base_url.to_string());
        provider
    }

    #[tokio::test]
    async fn registry_follows_declaration_order() {
        let mut fixture = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        fixture.write_all(br#"{"areas": {}}"#).unwrap();

        let mut local = ProviderConfig::new("local", ProviderKind::Fixture);
        local.path = Some(fixture.path().display().to_string());
        let mut disabled = http("baidu", "https://api.map.baidu.com");
        disabled.enabled = false;

        let config = Config {
            providers: vec![
                http("amap", "https://restapi.amap.com/v3"),
                disabled,
                local,
            ],
            ..Config::default()
        };

        let registry = build_registry(&config).await.unwrap();
        assert_eq!(registry.names(), vec!["amap", "local"]);
    }

    #[tokio::test]
    async fn misconfigured_providers_fail_the_build() {
        let config = Config {
            providers: vec![ProviderConfig::new("local", ProviderKind::Fixture)],
            ..Config::default()
        };
        assert!(matches!(
            build_registry(&config).await,
            Err(BuildError::MissingPath(_))
        ));

        let config = Config {
            providers: vec![ProviderConfig::new("amap", ProviderKind::Http)],
            ..Config::default()
        };
        assert!(matches!(
            build_registry(&config).await,
            Err(BuildError::MissingBaseUrl(_))
        ));
    }
}
