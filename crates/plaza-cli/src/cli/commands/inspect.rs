//! Read-only views of persisted districts and merchants.

use std::sync::Arc;

use console::style;

use plaza::{Config, EntityStore, FreshnessGate, SystemClock};

use super::helpers::{format_time, open_store, truncate};
use crate::cli::icons;

/// List the persisted areas of a city with their freshness.
pub async fn cmd_areas(config: &Config, city_id: &str) -> anyhow::Result<()> {
    let store: Arc<dyn EntityStore> = open_store(config).await?;
    let areas = store.list_areas_by_city(city_id).await?;

    if areas.is_empty() {
        println!(
            "{} No areas stored for '{}'. Run 'plaza aggregate {}' first.",
            icons::warn(),
            city_id,
            city_id
        );
        return Ok(());
    }

    let gate = FreshnessGate::new(
        Arc::clone(&store),
        Arc::new(SystemClock),
        config.aggregation.freshness_policy(),
    );

    println!("\n{}", style(format!("Areas in {}", city_id)).bold());
    println!("{}", "-".repeat(96));
    println!(
        "{:<18} {:<26} {:<12} {:>5} {:>6} {:>6}  {:<10} Updated",
        "ID", "Name", "Kind", "Hot", "Rating", "Stores", "Freshness"
    );
    println!("{}", "-".repeat(96));

    for area in &areas {
        let freshness = gate.evaluate(&area.id).await?;
        println!(
            "{:<18} {:<26} {:<12} {:>5} {:>6.1} {:>6}  {:<10} {}",
            truncate(&area.id, 18),
            truncate(&area.name, 25),
            area.kind.as_str(),
            area.hot_value,
            area.rating,
            area.store_count,
            freshness.as_str(),
            format_time(Some(area.updated_at))
        );
    }

    println!("\n{} area(s)", areas.len());
    Ok(())
}

/// Show one area and its stores.
pub async fn cmd_show(config: &Config, area_id: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let Some(area) = store.get_area(area_id).await? else {
        println!("{} Area '{}' not found", icons::error(), area_id);
        return Ok(());
    };
    let stores = store.list_stores_by_area(area_id).await?;

    if json {
        let body = serde_json::json!({ "area": area, "stores": stores });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("\n{}", style(&area.name).bold());
    println!("  ID:          {}", area.id);
    println!("  City:        {}", area.city_id);
    println!(
        "  Kind:        {}{}",
        area.kind.as_str(),
        area.tier
            .as_deref()
            .map(|t| format!(" (tier {})", t))
            .unwrap_or_default()
    );
    println!(
        "  Position:    {:.6}, {:.6}",
        area.coordinates.latitude, area.coordinates.longitude
    );
    println!("  Hot value:   {}", area.hot_value);
    println!("  Rating:      {:.1}", area.rating);
    if let Some(address) = &area.address {
        println!("  Address:     {}", address);
    }
    if !area.tags.is_empty() {
        println!("  Tags:        {}", area.tags.join(", "));
    }
    println!("  Providers:   {}", area.sources.join(", "));
    println!("  Updated:     {}", format_time(Some(area.updated_at)));

    if stores.is_empty() {
        println!("\n{} No stores aggregated yet", icons::warn());
        return Ok(());
    }

    println!("\n{}", style(format!("Stores ({})", stores.len())).bold());
    for s in &stores {
        let marker = if s.recommended { "★" } else { " " };
        println!(
            "  {} {:<30} {:<14} {:>4.1} {:>6} reviews",
            marker,
            truncate(&s.name, 30),
            s.category.as_str(),
            s.rating,
            s.review_count
        );
    }
    Ok(())
}
