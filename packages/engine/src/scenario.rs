//! Scenario variant: the same plots and regulation tables with one overlay
//! layer replaced by an alternate resolution.

use plot_gfa_config::GfaConfig;
use plot_gfa_overlay::ProgressCallback;
use plot_gfa_regulation::{RegulationIndex, link};
use plot_gfa_zoning_models::{
    AllowableGfaResult, ContextGpr, LayerId, Plot, PlotOverlayResult, QualityReport,
};

use crate::context::apply_context_gprs;
use crate::gfa::estimate;

/// Re-links and re-estimates every plot with `layer` taken from
/// `alternate`. The baseline overlay is only read; `contexts` are applied
/// to the new bundles as they are to the baseline's.
#[allow(clippy::too_many_arguments)]
pub fn run_scenario(
    baseline: &PlotOverlayResult,
    layer: &LayerId,
    alternate: &PlotOverlayResult,
    plots: &[Plot],
    index: &RegulationIndex,
    contexts: &[ContextGpr],
    settings: &GfaConfig,
    report: &mut QualityReport,
    progress: &dyn ProgressCallback,
) -> Vec<AllowableGfaResult> {
    log::info!("Running scenario with layer '{layer}' substituted");

    let overlay = baseline.with_layer_replaced(layer, alternate);
    let mut bundles = link(&overlay, plots, index, report);
    apply_context_gprs(&mut bundles, contexts);
    estimate(&bundles, settings, report, progress)
}
