//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};

use plaza::{Aggregator, Canonicalizer, Config, SqliteEntityStore};

/// Open the configured SQLite database, creating its directory if needed.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteEntityStore>> {
    let url = config.database_url();
    if let Some(path) = url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let store = SqliteEntityStore::open(&url)
        .await
        .with_context(|| format!("Failed to open database {}", url))?;
    Ok(Arc::new(store))
}

/// Build an aggregator over every enabled provider and the configured store.
pub async fn build_aggregator(config: &Config) -> anyhow::Result<Arc<Aggregator>> {
    let registry = plaza_sources::build_registry(config).await?;
    if registry.is_empty() {
        anyhow::bail!("No providers configured. Add a [[providers]] entry to plaza.toml");
    }

    let store = open_store(config).await?;
    let aggregation = &config.aggregation;
    let aggregator = Aggregator::new(registry, store)
        .with_policy(aggregation.freshness_policy())
        .with_canonicalizer(Canonicalizer::new(aggregation.identity_keyer()))
        .with_options(aggregation.aggregator_options());
    Ok(Arc::new(aggregator))
}

/// Empty selection means "every provider".
pub fn adapter_subset(adapters: Vec<String>) -> Option<Vec<String>> {
    if adapters.is_empty() {
        None
    } else {
        Some(adapters)
    }
}

/// Truncate a string to max characters with ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("West Lake", 20), "West Lake");
        assert_eq!(truncate("湖滨银泰in77购物中心", 6), "湖滨银...");
    }

    #[test]
    fn empty_subset_means_all() {
        assert_eq!(adapter_subset(Vec::new()), None);
        assert_eq!(
            adapter_subset(vec!["amap".to_string()]),
            Some(vec!["amap".to_string()])
        );
    }
}
