//! One-off aggregation runs.

use console::style;

use plaza::{AggregationRequest, AggregationResult, AggregationTarget, Config};

use super::helpers::{adapter_subset, build_aggregator};
use crate::cli::icons;

/// Aggregate a city.
pub async fn cmd_aggregate(
    config: &Config,
    city_id: &str,
    name: Option<&str>,
    adapters: Vec<String>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let name = name
        .map(str::to_string)
        .or_else(|| config.city(city_id).map(|c| c.name.clone()))
        .unwrap_or_else(|| city_id.to_string());

    run_target(
        config,
        AggregationTarget::city(city_id, &name),
        adapters,
        force,
        json,
    )
    .await
}

/// Refresh one area's stores.
pub async fn cmd_area(
    config: &Config,
    area_id: &str,
    adapters: Vec<String>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    run_target(config, AggregationTarget::area(area_id), adapters, force, json).await
}

async fn run_target(
    config: &Config,
    target: AggregationTarget,
    adapters: Vec<String>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let aggregator = build_aggregator(config).await?;

    if !json {
        println!("{} Aggregating {}...", icons::info(), target);
    }

    let request = AggregationRequest::new(target)
        .with_adapters(adapter_subset(adapters))
        .force(force);
    let result = aggregator.aggregate(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        anyhow::bail!(
            "{}",
            result
                .failure
                .as_deref()
                .unwrap_or("no provider returned data")
        );
    }
    Ok(())
}

fn print_result(result: &AggregationResult) {
    let source = if result.from_cache {
        style("(from cache)").dim().to_string()
    } else {
        String::new()
    };
    println!(
        "{} {} {}",
        icons::outcome(result.success, result.is_partial()),
        style(result.target.to_string()).bold(),
        source
    );

    println!("  Areas:       {}", result.areas_count);
    println!("  Stores:      {}", result.stores_count);
    if !result.adapters_used.is_empty() {
        println!("  Providers:   {}", result.adapters_used.join(", "));
    }
    if result.rejected > 0 || result.collisions > 0 {
        println!(
            "  Dropped:     {} incomplete, {} merged duplicates",
            result.rejected, result.collisions
        );
    }
    if result.persistence_failures > 0 {
        println!(
            "  {} {} record(s) could not be saved",
            icons::warn(),
            result.persistence_failures
        );
    }

    for failure in &result.errors {
        println!(
            "  {} {} ({}): {}",
            icons::error(),
            failure.adapter,
            failure.target,
            failure.message
        );
    }

    let took = result.finished_at - result.started_at;
    println!(
        "  {}",
        style(format!("Took {}ms", took.num_milliseconds())).dim()
    );
}
