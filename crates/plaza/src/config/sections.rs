//! Configuration sections.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatorOptions, DEFAULT_MAX_PARALLEL_ADAPTERS};
use crate::freshness::{FreshnessPolicy, DEFAULT_FRESHNESS_WINDOW_HOURS};
use crate::identity::{IdentityKeyer, DEFAULT_COORDINATE_PRECISION};
use crate::scheduler::{KnownCity, SchedulerSettings, DEFAULT_MAX_INSTANCES};
use crate::sources::DEFAULT_STORE_RADIUS_METERS;
use crate::stats::DEFAULT_ERROR_HISTORY;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn default_true() -> bool {
    true
}

fn default_window_hours() -> i64 {
    env_parse("PLAZA_FRESHNESS_WINDOW_HOURS").unwrap_or(DEFAULT_FRESHNESS_WINDOW_HOURS)
}

fn default_precision() -> u32 {
    env_parse("PLAZA_COORDINATE_PRECISION").unwrap_or(DEFAULT_COORDINATE_PRECISION)
}

fn default_max_parallel() -> usize {
    env_parse("PLAZA_MAX_PARALLEL_ADAPTERS").unwrap_or(DEFAULT_MAX_PARALLEL_ADAPTERS)
}

fn default_error_history() -> usize {
    DEFAULT_ERROR_HISTORY
}

fn default_radius() -> u32 {
    DEFAULT_STORE_RADIUS_METERS
}

/// Aggregation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct AggregationConfig {
    /// Hours a persisted area stays fresh.
    #[serde(default = "default_window_hours")]
    #[prefer(default)]
    pub freshness_window_hours: i64,
    /// Decimal places coordinates are rounded to for identity.
    #[serde(default = "default_precision")]
    #[prefer(default)]
    pub coordinate_precision: u32,
    #[serde(default = "default_max_parallel")]
    #[prefer(default)]
    pub max_parallel_adapters: usize,
    #[serde(default = "default_error_history")]
    #[prefer(default)]
    pub error_history: usize,
    /// Refresh stores of every area a city run persists.
    #[serde(default = "default_true")]
    #[prefer(default)]
    pub cascade_stores: bool,
    #[serde(default = "default_radius")]
    #[prefer(default)]
    pub store_radius_meters: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            freshness_window_hours: default_window_hours(),
            coordinate_precision: default_precision(),
            max_parallel_adapters: default_max_parallel(),
            error_history: default_error_history(),
            cascade_stores: true,
            store_radius_meters: default_radius(),
        }
    }
}

impl AggregationConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::from_hours(self.freshness_window_hours)
    }

    pub fn identity_keyer(&self) -> IdentityKeyer {
        IdentityKeyer::new(self.coordinate_precision)
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            cascade_stores: self.cascade_stores,
            max_parallel_adapters: self.max_parallel_adapters.max(1),
            store_radius_meters: self.store_radius_meters,
            error_history: self.error_history,
        }
    }
}

fn default_poll_secs() -> u64 {
    env_parse("PLAZA_SCHEDULER_POLL_SECS").unwrap_or(30)
}

fn default_max_instances() -> usize {
    DEFAULT_MAX_INSTANCES
}

fn default_daily_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_weekly_cron() -> String {
    "0 0 3 * * Sun".to_string()
}

fn default_daily_limit() -> usize {
    10
}

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_secs")]
    #[prefer(default)]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_instances")]
    #[prefer(default)]
    pub max_instances: usize,
    /// Cron expression (with seconds) for the daily priority refresh.
    #[serde(default = "default_daily_cron")]
    #[prefer(default)]
    pub daily_cron: String,
    #[serde(default = "default_daily_limit")]
    #[prefer(default)]
    pub daily_target_limit: usize,
    /// Cron expression (with seconds) for the weekly full sync.
    #[serde(default = "default_weekly_cron")]
    #[prefer(default)]
    pub weekly_cron: String,
    /// Install the daily and weekly jobs when the daemon starts.
    #[serde(default = "default_true")]
    #[prefer(default)]
    pub default_jobs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
            max_instances: default_max_instances(),
            daily_cron: default_daily_cron(),
            daily_target_limit: default_daily_limit(),
            weekly_cron: default_weekly_cron(),
            default_jobs: true,
        }
    }
}

impl SchedulerConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            max_instances: self.max_instances.max(1),
            daily_cron: self.daily_cron.clone(),
            daily_target_limit: self.daily_target_limit,
            weekly_cron: self.weekly_cron.clone(),
        }
    }
}

/// How a provider is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// JSON over HTTP.
    #[default]
    Http,
    /// Canned observations read from a local file.
    Fixture,
}

impl prefer::FromValue for ProviderKind {
    fn from_value(value: &prefer::ConfigValue) -> prefer::Result<Self> {
        match value.as_str() {
            Some(s) => match s.to_lowercase().as_str() {
                "http" => Ok(ProviderKind::Http),
                "fixture" => Ok(ProviderKind::Fixture),
                other => Err(prefer::Error::ConversionError {
                    key: String::new(),
                    type_name: "ProviderKind".to_string(),
                    source: format!("unknown provider kind: {}", other).into(),
                }),
            },
            None => Err(prefer::Error::ConversionError {
                key: String::new(),
                type_name: "ProviderKind".to_string(),
                source: "expected string".into(),
            }),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Http => write!(f, "http"),
            ProviderKind::Fixture => write!(f, "fixture"),
        }
    }
}

fn default_areas_path() -> String {
    "/areas".to_string()
}

fn default_stores_path() -> String {
    "/stores".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

/// One data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct ProviderConfig {
    /// Adapter name used in requests and error reports.
    pub name: String,
    #[serde(default)]
    #[prefer(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    #[prefer(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_areas_path")]
    #[prefer(default)]
    pub areas_path: String,
    #[serde(default = "default_stores_path")]
    #[prefer(default)]
    pub stores_path: String,
    /// Fixture file for `fixture` providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_secs")]
    #[prefer(default)]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    #[prefer(default)]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    #[prefer(default)]
    pub retry_backoff_ms: u64,
    /// Lower bound of the randomized pause before each request.
    #[serde(default)]
    #[prefer(default)]
    pub min_delay_ms: u64,
    #[serde(default)]
    #[prefer(default)]
    pub max_delay_ms: u64,
}

impl ProviderConfig {
    pub fn new(name: &str, kind: ProviderKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            base_url: None,
            areas_path: default_areas_path(),
            stores_path: default_stores_path(),
            path: None,
            api_key: None,
            api_key_env: None,
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Inline key, else the named environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone().filter(|k| !k.is_empty()).or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| env::var(var).ok())
                .filter(|k| !k.is_empty())
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// A city the scheduler refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, prefer::FromValue)]
pub struct CityConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    #[prefer(default)]
    pub priority: i64,
}

impl From<&CityConfig> for KnownCity {
    fn from(city: &CityConfig) -> Self {
        KnownCity::new(&city.id, &city.name, city.priority)
    }
}
