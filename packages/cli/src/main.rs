#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the CityPulse analytics core.
//!
//! Wires the HTTP adapters to the forecasting, event-impact, and routing
//! services and prints each result as JSON on stdout. Logging goes to
//! stderr and is controlled by `RUST_LOG`.

mod commands;

use std::path::PathBuf;

use citypulse_config::AnalyticsConfig;
use citypulse_spatial::Location;
use clap::{Parser, Subcommand};

/// Ho Chi Minh City center, used when no location is given.
const DEFAULT_CENTER: &str = "10.7769,106.7009";

#[derive(Parser)]
#[command(name = "citypulse", about = "CityPulse predictive analytics")]
struct Cli {
    /// Analytics config file (overrides `CITYPULSE_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast air quality hour by hour and find the cleanest window
    Forecast {
        /// Location as "lat,lng"
        #[arg(long, default_value = DEFAULT_CENTER)]
        location: Location,
        /// Add an LLM-written summary when a narrative provider is configured
        #[arg(long)]
        narrate: bool,
    },
    /// Discover upcoming large events and score their congestion risk
    Events {
        /// Search center as "lat,lng"
        #[arg(long, default_value = DEFAULT_CENTER)]
        center: Location,
        /// Lookahead in hours (defaults to `events.lookahead_hours`)
        #[arg(long)]
        hours: Option<u32>,
        /// Add an LLM-written summary to each event
        #[arg(long)]
        narrate: bool,
    },
    /// Compare an external route estimate with the internal road network
    Route {
        /// Origin as "lat,lng"
        #[arg(long)]
        from: Location,
        /// Destination as "lat,lng"
        #[arg(long)]
        to: Location,
    },
    /// List the configured event directories
    Directories,
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyticsConfig, citypulse_config::ConfigError> {
    match path {
        Some(path) => {
            log::info!("Loading analytics config from {}", path.display());
            AnalyticsConfig::from_path(path)
        }
        None => AnalyticsConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Forecast { location, narrate } => {
            commands::forecast(config, location, narrate).await?;
        }
        Commands::Events {
            center,
            hours,
            narrate,
        } => {
            commands::events(config, center, hours, narrate).await?;
        }
        Commands::Route { from, to } => {
            commands::route(config, from, to).await?;
        }
        Commands::Directories => commands::directories(),
        Commands::Config => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}
