//! Output files and publication.

use std::path::{Path, PathBuf};

use plot_gfa_config::RunConfig;
use plot_gfa_ingest::write_quality_report;
use plot_gfa_triples::{QuadSet, StoreSink};
use plot_gfa_zoning_models::QualityReport;

use crate::{Command, CommandSummary, PipelineError, RunOptions};

pub const GFA_RESULTS: &str = "gfa_results.csv";
pub const GFA_RESULTS_SCENARIO: &str = "gfa_results_scenario.csv";
pub const REGULATION_OVERVIEW: &str = "regulation_overview.csv";
pub const GFA_OVERVIEW: &str = "gfa_overview.csv";
pub const SCENARIO_DIFFERENCE: &str = "scenario_difference.csv";

/// The output directory.
#[derive(Debug, Clone)]
pub struct Outputs {
    dir: PathBuf,
}

impl Outputs {
    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the directory cannot be created.
    pub fn prepare(dir: &Path) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Path of a file in the output directory.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// `output_<command>.nq`.
    #[must_use]
    pub fn nquads(&self, command: Command) -> PathBuf {
        self.path(&format!("output_{command}.nq"))
    }

    /// `<command>_quality_report.csv`.
    #[must_use]
    pub fn quality_report(&self, command: Command) -> PathBuf {
        self.path(&format!("{command}_quality_report.csv"))
    }
}

/// Writes the command's quads and quality report, then uploads the quads
/// to `namespace` when uploading is enabled.
///
/// # Errors
///
/// Returns [`PipelineError`] if a file cannot be written or the upload
/// fails.
pub async fn publish(
    config: &RunConfig,
    options: RunOptions,
    command: Command,
    namespace: &str,
    quads: &QuadSet,
    report: &QualityReport,
) -> Result<CommandSummary, PipelineError> {
    let outputs = Outputs::prepare(&config.paths.output_dir)?;

    let nquads = outputs.nquads(command);
    quads.write_to(&nquads).map_err(|source| PipelineError::Io {
        path: nquads.clone(),
        source,
    })?;
    write_quality_report(&outputs.quality_report(command), report)?;

    let uploaded = if options.upload {
        StoreSink::new(&config.store)?.upload(namespace, quads).await?
    } else {
        log::info!("Upload disabled; quads left in {}", nquads.display());
        0
    };

    Ok(CommandSummary {
        command,
        quads: quads.len(),
        uploaded,
        issues: report.len(),
    })
}
