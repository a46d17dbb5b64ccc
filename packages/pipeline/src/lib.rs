#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch commands of the plot GFA toolchain.
//!
//! Each [`Command`] loads what it needs from the paths in the
//! [`RunConfig`](plot_gfa_config::RunConfig), runs the stages, writes its
//! N-Quads file and quality report to the output directory, and uploads
//! the quads unless [`RunOptions::upload`] is off. Commands share no state
//! besides those files, so any of them can be re-run on its own.

pub mod commands;
pub mod inputs;
pub mod outputs;

use std::path::PathBuf;

use plot_gfa_config::RunConfig;
use plot_gfa_overlay::ProgressCallback;
use strum_macros::{AsRefStr, Display};

pub use commands::{
    enrich_plots, estimate_gfa, init_namespaces, instantiate_area_regulations,
    instantiate_type_regulations, report,
};

/// Errors that abort a command.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input could not be loaded or an output written.
    #[error(transparent)]
    Ingest(#[from] plot_gfa_ingest::IngestError),

    /// A regulation table is unusable.
    #[error(transparent)]
    Regulation(#[from] plot_gfa_regulation::RegulationError),

    /// Plot or layer identifiers are not unique.
    #[error(transparent)]
    Overlay(#[from] plot_gfa_overlay::OverlayError),

    /// The store rejected a request or could not be reached.
    #[error(transparent)]
    Sink(#[from] plot_gfa_triples::SinkError),

    /// An output file or directory could not be written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A scenario run was requested without a `[scenario]` section.
    #[error("No [scenario] section in the configuration")]
    NoScenario,
}

/// The batch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    /// Create the baseline and scenario namespaces.
    InitNamespaces,
    /// Publish area-based regulations and their links to plots.
    InstantiateAreaRegulations,
    /// Publish site areas and neighbour links.
    EnrichPlots,
    /// Publish type-based regulations and their links to plots.
    InstantiateTypeRegulations,
    /// Estimate and publish baseline allowable GFAs.
    EstimateGfa,
    /// Estimate and publish allowable GFAs with the scenario layer.
    EstimateGfaScenario,
    /// Write the summary tables.
    Report,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Send quads to the store. Output files are written either way.
    pub upload: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { upload: true }
    }
}

/// What a command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSummary {
    pub command: Command,
    /// Quads written to the command's N-Quads file.
    pub quads: usize,
    /// Quads sent to the store.
    pub uploaded: usize,
    /// Entries in the command's quality report.
    pub issues: usize,
}

/// Runs one command.
///
/// # Errors
///
/// Returns [`PipelineError`] if an input cannot be loaded, an output
/// cannot be written, or the upload fails.
pub async fn run(
    command: Command,
    config: &RunConfig,
    options: RunOptions,
    progress: &dyn ProgressCallback,
) -> Result<CommandSummary, PipelineError> {
    log::info!("Running {command}");

    let summary = match command {
        Command::InitNamespaces => init_namespaces(config, options).await?,
        Command::InstantiateAreaRegulations => {
            instantiate_area_regulations(config, options, progress).await?
        }
        Command::EnrichPlots => enrich_plots(config, options).await?,
        Command::InstantiateTypeRegulations => {
            instantiate_type_regulations(config, options, progress).await?
        }
        Command::EstimateGfa => estimate_gfa(config, options, false, progress).await?,
        Command::EstimateGfaScenario => estimate_gfa(config, options, true, progress).await?,
        Command::Report => report(config, progress)?,
    };

    log::info!(
        "{command}: {} quads written, {} uploaded, {} quality issues",
        summary.quads,
        summary.uploaded,
        summary.issues
    );
    Ok(summary)
}
