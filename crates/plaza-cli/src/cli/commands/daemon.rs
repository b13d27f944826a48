//! Scheduling daemon.

use std::sync::Arc;

use console::style;
use tokio::sync::watch;
use tracing::info;

use plaza::{AggregationTarget, Config, JobTargets, RefreshScheduler};

use super::helpers::{build_aggregator, format_time};
use crate::cli::icons;

const EXTRA_JOB: &str = "cli-recurring";

/// Run the refresh scheduler until Ctrl-C.
pub async fn cmd_daemon(
    config: &Config,
    default_jobs: bool,
    cron: Option<&str>,
    cities: &[String],
) -> anyhow::Result<()> {
    let aggregator = build_aggregator(config).await?;
    let directory = Arc::new(config.target_directory());
    let scheduler = Arc::new(
        RefreshScheduler::new(aggregator.clone(), directory)
            .with_settings(config.scheduler.settings()),
    );

    if default_jobs && config.scheduler.default_jobs {
        if config.cities.is_empty() {
            println!(
                "{} No cities configured; default jobs will have nothing to refresh",
                icons::warn()
            );
        }
        scheduler.register_default_jobs()?;
    }

    if let Some(expression) = cron {
        let targets = cities
            .iter()
            .map(|id| {
                let name = config.city(id).map_or(id.as_str(), |c| c.name.as_str());
                AggregationTarget::city(id, name)
            })
            .collect();
        let targets = JobTargets::Static { targets };
        scheduler.schedule_recurring(EXTRA_JOB, targets, expression, None)?;
    }

    let jobs = scheduler.list_jobs();
    if jobs.is_empty() {
        println!("{} No jobs to run", icons::warn());
        return Ok(());
    }

    println!("\n{}", style("Scheduled jobs").bold());
    for job in &jobs {
        println!(
            "  {} {:<18} {:<22} next {}",
            icons::info(),
            job.name,
            job.trigger,
            format_time(job.next_run)
        );
    }
    println!("{}", style("Press Ctrl-C to stop").dim());

    let (shutdown, receiver) = watch::channel(false);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(receiver).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for the scheduler loop to exit");
    println!("\n{} Stopping scheduler...", icons::info());
    let _ = shutdown.send(true);
    runner.await?;

    let stats = aggregator.statistics();
    println!(
        "{} {} run(s), {} area(s), {} store(s) aggregated",
        icons::success(),
        stats.runs,
        stats.areas_aggregated,
        stats.stores_aggregated
    );
    for job in scheduler.list_jobs() {
        if job.runs_skipped > 0 {
            println!(
                "  {} {} skipped {} overlapping trigger(s)",
                icons::warn(),
                job.name,
                job.runs_skipped
            );
        }
    }
    Ok(())
}
