//! Per-plot progress of the overlay and GFA stages.
//!
//! Both stages walk the plot list once, so progress is counted in plots.
//! The CLI renders it with `indicatif`; tests and library callers pass
//! [`NullProgress`].

use plot_gfa_zoning_models::Stage;

/// Receives plot counts from a stage that walks every plot.
pub trait ProgressCallback: Send + Sync {
    /// `stage` starts on `plots` plots, each checked against `layers`
    /// regulation layers (zero when the stage reads no layer).
    fn begin(&self, stage: Stage, plots: u64, layers: usize);

    /// `plots` more plots are done.
    fn advance(&self, plots: u64);

    /// The stage is over; `summary` says what it produced.
    fn finish(&self, summary: String);
}

/// What a bar shows while `stage` runs.
#[must_use]
pub fn stage_message(stage: Stage, layers: usize) -> String {
    let action = match stage {
        Stage::Ingest => "Loading plots",
        Stage::Overlay => "Resolving zones",
        Stage::Normalize => "Normalizing regulations",
        Stage::Link => "Linking regulations",
        Stage::Engine => "Estimating allowable GFA",
    };
    match layers {
        0 => action.to_string(),
        1 => format!("{action} in 1 layer"),
        n => format!("{action} in {n} layers"),
    }
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn begin(&self, _stage: Stage, _plots: u64, _layers: usize) {}
    fn advance(&self, _plots: u64) {}
    fn finish(&self, _summary: String) {}
}
