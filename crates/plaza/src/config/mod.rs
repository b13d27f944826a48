//! Configuration management using the prefer crate.

mod sections;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scheduler::{KnownCity, StaticTargetDirectory};

pub use sections::{
    AggregationConfig, CityConfig, ProviderConfig, ProviderKind, SchedulerConfig,
};

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "plaza.db";

/// Errors reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename (joined with data_dir) or full `sqlite://` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "AggregationConfig::is_default")]
    #[prefer(default)]
    pub aggregation: AggregationConfig,
    #[serde(default, skip_serializing_if = "SchedulerConfig::is_default")]
    #[prefer(default)]
    pub scheduler: SchedulerConfig,
    /// Providers in registration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub providers: Vec<ProviderConfig>,
    /// Cities the scheduled jobs refresh.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub cities: Vec<CityConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load `plaza.{toml,yaml,json}` in the standard locations.
    /// Falls back to defaults (with environment overrides) when nothing is
    /// found or the file is unreadable.
    pub async fn load() -> Self {
        match prefer::load("plaza").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path, parsed by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };

        tracing::debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory relative paths resolve against: the config file's
    /// directory, else the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Expand `~` and resolve relative paths against [`Config::base_dir`].
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        match self.data_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => dirs::data_dir()
                .map(|d| d.join("plaza"))
                .unwrap_or_else(|| PathBuf::from(".plaza")),
        }
    }

    /// Database URL. `DATABASE_URL` wins, then the `database` setting, then
    /// `plaza.db` in the data directory.
    pub fn database_url(&self) -> String {
        if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
            tracing::debug!("Using DATABASE_URL from environment");
            return url;
        }
        match self.database {
            Some(ref database) if database.contains("://") => database.clone(),
            Some(ref database) => {
                let path = Path::new(database);
                if path.is_absolute() {
                    format!("sqlite://{}", path.display())
                } else {
                    format!("sqlite://{}", self.data_dir().join(path).display())
                }
            }
            None => format!(
                "sqlite://{}",
                self.data_dir().join(DEFAULT_DATABASE_FILENAME).display()
            ),
        }
    }

    /// Enabled providers in declaration order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    pub fn target_directory(&self) -> StaticTargetDirectory {
        StaticTargetDirectory::new(self.cities.iter().map(KnownCity::from).collect())
    }

    pub fn city(&self, id: &str) -> Option<&CityConfig> {
        self.cities.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn loads_toml_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database = "custom.db"

[aggregation]
freshness_window_hours = 12
coordinate_precision = 4

[scheduler]
daily_target_limit = 3

[[providers]]
name = "amap"
base_url = "https://example.test/api"
api_key_env = "PLAZA_TEST_AMAP_KEY"

[[providers]]
name = "offline"
kind = "fixture"
path = "fixtures/offline.json"
enabled = false

[[cities]]
id = "hz"
name = "Hangzhou"
priority = 9
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).await.unwrap();

        assert_eq!(config.aggregation.freshness_window_hours, 12);
        assert_eq!(config.aggregation.identity_keyer().precision(), 4);
        assert!(config.aggregation.cascade_stores);
        assert_eq!(config.scheduler.daily_target_limit, 3);
        assert_eq!(config.scheduler.daily_cron, "0 0 2 * * *");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].kind, ProviderKind::Fixture);
        assert_eq!(config.providers[0].areas_path, "/areas");
        let enabled: Vec<_> = config.enabled_providers().map(|p| p.name.as_str()).collect();
        assert_eq!(enabled, vec!["amap"]);
        assert_eq!(config.city("hz").unwrap().priority, 9);
        assert_eq!(config.source_path.as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn loads_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "providers:\n  - name: amap\n    base_url: https://example.test\ncities:\n  - id: sh\n    name: Shanghai\n"
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.providers[0].name, "amap");
        assert_eq!(config.cities[0].priority, 0);
    }

    #[tokio::test]
    async fn parse_errors_name_the_format() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();
        let err = Config::load_from_path(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn relative_database_joins_data_dir() {
        let config = Config {
            data_dir: Some("/var/lib/plaza".to_string()),
            database: Some("districts.db".to_string()),
            ..Config::default()
        };
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(config.database_url(), "sqlite:///var/lib/plaza/districts.db");
        }
    }

    #[test]
    fn url_database_is_used_verbatim() {
        let config = Config {
            database: Some("sqlite:///tmp/plaza-test.db".to_string()),
            ..Config::default()
        };
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(config.database_url(), "sqlite:///tmp/plaza-test.db");
        }
    }

    #[test]
    fn inline_api_key_wins() {
        let mut provider = ProviderConfig::new("amap", ProviderKind::Http);
        provider.api_key = Some("inline".to_string());
        provider.api_key_env = Some("PLAZA_TEST_UNSET_KEY".to_string());
        assert_eq!(provider.api_key().as_deref(), Some("inline"));
    }

    #[test]
    fn directory_orders_cities_by_priority() {
        let config = Config {
            cities: vec![
                CityConfig {
                    id: "sh".to_string(),
                    name: "Shanghai".to_string(),
                    priority: 1,
                },
                CityConfig {
                    id: "hz".to_string(),
                    name: "Hangzhou".to_string(),
                    priority: 5,
                },
            ],
            ..Config::default()
        };
        let directory = config.target_directory();
        assert_eq!(directory.cities()[0].id, "hz");
    }
}
