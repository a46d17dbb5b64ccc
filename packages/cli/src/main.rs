#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point of the plot GFA toolchain.
//!
//! Each subcommand runs one batch command from `plot_gfa_pipeline`
//! against the configuration file given by `--config`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use plot_gfa_cli_utils::IndicatifProgress;
use plot_gfa_config::RunConfig;
use plot_gfa_pipeline::{Command, RunOptions};

#[derive(Parser)]
#[command(name = "plot_gfa_cli", about = "Plot regulation and allowable GFA toolchain")]
struct Cli {
    /// Run configuration (TOML)
    #[arg(long, default_value = "gfa.toml")]
    config: PathBuf,

    /// Write output files only; do not contact the store
    #[arg(long)]
    no_upload: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store namespaces
    InitNamespaces,
    /// Publish area-based regulations and plot links
    InstantiateAreaRegulations,
    /// Publish plot site areas and neighbours
    EnrichPlots,
    /// Publish type-based regulations and plot links
    InstantiateTypeRegulations,
    /// Estimate allowable GFA for every plot
    EstimateGfa {
        /// Substitute the configured scenario layer
        #[arg(long)]
        scenario: bool,
    },
    /// Write summary tables from the latest results
    Report,
}

impl Commands {
    const fn command(&self) -> Command {
        match self {
            Self::InitNamespaces => Command::InitNamespaces,
            Self::InstantiateAreaRegulations => Command::InstantiateAreaRegulations,
            Self::EnrichPlots => Command::EnrichPlots,
            Self::InstantiateTypeRegulations => Command::InstantiateTypeRegulations,
            Self::EstimateGfa { scenario: false } => Command::EstimateGfa,
            Self::EstimateGfa { scenario: true } => Command::EstimateGfaScenario,
            Self::Report => Command::Report,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = plot_gfa_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = RunConfig::load(&cli.config)?;
    let options = RunOptions {
        upload: !cli.no_upload,
    };
    let command = cli.command.command();

    let start = std::time::Instant::now();
    let progress = IndicatifProgress::command_bar(&multi, &command.to_string());
    let summary = plot_gfa_pipeline::run(command, &config, options, progress.as_ref()).await?;

    log::info!(
        "{command} finished in {:.1}s ({} quads, {} quality issues)",
        start.elapsed().as_secs_f64(),
        summary.quads,
        summary.issues
    );

    Ok(())
}
