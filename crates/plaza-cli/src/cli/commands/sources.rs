//! Provider listing and health checks.

use console::style;

use plaza::config::ProviderKind;
use plaza::Config;

use super::helpers::truncate;
use crate::cli::icons;

/// List configured providers in registration order.
pub fn cmd_sources_list(config: &Config) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        println!(
            "{} No providers configured. Add a [[providers]] entry to plaza.toml",
            icons::warn()
        );
        return Ok(());
    }

    println!("\n{}", style("Providers").bold());
    println!("{}", "-".repeat(80));
    println!("{:<15} {:<9} {:<8} Endpoint", "Name", "Kind", "Enabled");
    println!("{}", "-".repeat(80));

    for provider in &config.providers {
        let endpoint = match provider.kind {
            ProviderKind::Http => provider.base_url.clone(),
            ProviderKind::Fixture => provider.path.clone(),
        }
        .unwrap_or_else(|| "(not set)".to_string());

        println!(
            "{:<15} {:<9} {:<8} {}",
            truncate(&provider.name, 15),
            provider.kind.to_string(),
            if provider.enabled { "yes" } else { "no" },
            endpoint
        );
    }
    Ok(())
}

/// Probe enabled providers, or just the named one.
pub async fn cmd_sources_probe(config: &Config, name: Option<&str>) -> anyhow::Result<()> {
    let registry = plaza_sources::build_registry(config).await?;

    let adapters: Vec<_> = registry
        .all()
        .iter()
        .filter(|a| name.map_or(true, |n| a.name() == n))
        .cloned()
        .collect();

    if adapters.is_empty() {
        match name {
            Some(n) => println!("{} Provider '{}' not found or disabled", icons::error(), n),
            None => println!("{} No enabled providers", icons::warn()),
        }
        return Ok(());
    }

    let mut unhealthy = 0;
    for adapter in adapters {
        let report = adapter.probe().await;
        let icon = if report.healthy {
            icons::success()
        } else {
            unhealthy += 1;
            icons::error()
        };
        println!("{} {:<15} {}", icon, adapter.name(), report.message);
    }

    if unhealthy > 0 {
        anyhow::bail!("{} provider(s) unreachable", unhealthy);
    }
    Ok(())
}
