//! CLI parser and command dispatch.

mod aggregate;
mod daemon;
mod helpers;
mod inspect;
mod sources;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use plaza::Config;

#[derive(Parser)]
#[command(name = "plaza")]
#[command(about = "Multi-source commercial district and merchant aggregation")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file or URL (overrides the config file; DATABASE_URL still wins)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every district of a city, cascading into their stores
    Aggregate {
        /// City ID
        city_id: String,
        /// Display name sent to providers (defaults to the configured city name)
        #[arg(long)]
        name: Option<String>,
        /// Only use these providers (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        adapters: Vec<String>,
        /// Ignore persisted data even when it is fresh
        #[arg(short, long)]
        force: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh the stores of one persisted district
    Area {
        /// Area ID
        area_id: String,
        /// Only use these providers (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        adapters: Vec<String>,
        /// Ignore persisted data even when it is fresh
        #[arg(short, long)]
        force: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List persisted districts of a city
    Areas {
        /// City ID
        city_id: String,
    },

    /// Show one persisted district and its stores
    Show {
        /// Area ID
        area_id: String,
        /// Print the area and stores as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configured providers
    Sources {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Run the refresh scheduler until interrupted
    Daemon {
        /// Do not register the daily and weekly refresh jobs
        #[arg(long)]
        no_default_jobs: bool,
        /// Extra recurring job rule (cron with seconds field)
        #[arg(long, requires = "cities")]
        cron: Option<String>,
        /// Cities for the extra job (comma-separated)
        #[arg(long, value_delimiter = ',')]
        cities: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SourceCommands {
    /// List configured providers
    List,
    /// Check that providers are reachable
    Probe {
        /// Provider name (all enabled providers if omitted)
        name: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };
    if let Some(database) = cli.database {
        config.database = Some(database);
    }

    match cli.command {
        Commands::Aggregate {
            city_id,
            name,
            adapters,
            force,
            json,
        } => {
            aggregate::cmd_aggregate(&config, &city_id, name.as_deref(), adapters, force, json)
                .await
        }
        Commands::Area {
            area_id,
            adapters,
            force,
            json,
        } => aggregate::cmd_area(&config, &area_id, adapters, force, json).await,
        Commands::Areas { city_id } => inspect::cmd_areas(&config, &city_id).await,
        Commands::Show { area_id, json } => inspect::cmd_show(&config, &area_id, json).await,
        Commands::Sources { command } => match command {
            SourceCommands::List => sources::cmd_sources_list(&config),
            SourceCommands::Probe { name } => {
                sources::cmd_sources_probe(&config, name.as_deref()).await
            }
        },
        Commands::Daemon {
            no_default_jobs,
            cron,
            cities,
        } => daemon::cmd_daemon(&config, !no_default_jobs, cron.as_deref(), &cities).await,
    }
}
