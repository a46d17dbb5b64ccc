#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the plot GFA binaries.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above the progress
//! bars instead of through them. [`IndicatifProgress`] counts plots through
//! the overlay and engine stages of one command.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use plot_gfa_overlay::{ProgressCallback, stage_message};
use plot_gfa_zoning_models::Stage;

pub use indicatif::MultiProgress;

const PLOTS_TEMPLATE: &str =
    "  {prefix} {msg} {wide_bar:.cyan/dim} {pos}/{len} plots {percent}% [{eta}]";

/// One bar per command. It spins between stages, showing the command name,
/// and counts plots while a stage runs.
pub struct IndicatifProgress {
    bar: ProgressBar,
    spinner: ProgressStyle,
    plots: ProgressStyle,
}

impl IndicatifProgress {
    /// A bar for `command`, spinning until the first stage begins.
    #[must_use]
    pub fn command_bar(multi: &MultiProgress, command: &str) -> Arc<dyn ProgressCallback> {
        let spinner = ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let plots = ProgressStyle::with_template(PLOTS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(spinner.clone());
        bar.set_prefix(command.to_string());
        bar.set_message("loading inputs");

        Arc::new(Self {
            bar,
            spinner,
            plots,
        })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn begin(&self, stage: Stage, plots: u64, layers: usize) {
        self.bar.reset();
        self.bar.set_length(plots);
        self.bar.set_style(self.plots.clone());
        self.bar.set_message(stage_message(stage, layers));
    }

    fn advance(&self, plots: u64) {
        self.bar.inc(plots);
    }

    fn finish(&self, summary: String) {
        // Back to spinning until the next stage, or the end of the command.
        self.bar.set_style(self.spinner.clone());
        self.bar.set_message(summary);
    }
}

/// Installs the global logger (filtered by `RUST_LOG`, `info` when unset)
/// and returns the [`MultiProgress`] every bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let logger = builder.build();
    let level = logger.filter();

    // Already initialized when several commands run in one process.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
