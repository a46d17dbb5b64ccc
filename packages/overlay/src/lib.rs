#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry overlay resolution.
//!
//! For every plot and every regulation zone layer, intersects the plot
//! footprint with each candidate zone (found through an R-tree on zone
//! bounding boxes) and keeps the zone with the largest overlap as the
//! plot's dominant zone for that layer. Equal overlaps go to the lowest
//! zone identifier, so the result never depends on input order.
//!
//! Invalid geometry is repaired first (see [`repair`]). A plot whose
//! footprint cannot be repaired is unresolved in every layer; a zone that
//! cannot be repaired is dropped from its layer. Both cases are recorded
//! in the [`QualityReport`] and never abort the run.

pub mod enrich;
pub mod index;
pub mod progress;
pub mod properties;
pub mod repair;

use std::collections::{BTreeMap, BTreeSet};

use geo::{Area, BooleanOps, MultiPolygon};
use plot_gfa_zoning_models::{
    IssueKind, LayerId, Plot, PlotId, PlotOverlayResult, QualityReport, RegulationZoneLayer,
    Stage, ZoneAssignment,
};

pub use enrich::{neighbour_links, site_area};
pub use index::ZoneIndex;
pub use progress::{NullProgress, ProgressCallback, stage_message};
pub use properties::{ShapeSettings, residential_area, residential_properties, road_properties};
pub use repair::{RepairError, repair};

/// Overlaps (m²) closer than this are treated as equal.
const TIE_EPSILON: f64 = 1e-6;

/// Errors that make an overlay run meaningless.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Two plots share an identifier.
    #[error("Duplicate plot id '{0}'")]
    DuplicatePlot(PlotId),

    /// Two layers share a name.
    #[error("Duplicate layer '{0}'")]
    DuplicateLayer(LayerId),
}

/// A layer whose zones have been repaired and indexed.
pub struct PreparedLayer {
    /// Layer name.
    pub id: LayerId,
    /// Minimum qualifying `overlap / plot area`.
    pub min_overlap_ratio: f64,
    /// Indexed zones.
    pub index: ZoneIndex,
}

impl PreparedLayer {
    /// Repairs every zone of `layer` and indexes the survivors. Zones that
    /// fail repair are recorded in `report` and left out.
    #[must_use]
    pub fn prepare(layer: &RegulationZoneLayer, report: &mut QualityReport) -> Self {
        let mut zones = Vec::with_capacity(layer.zones.len());

        for zone in &layer.zones {
            match repair(&zone.geometry) {
                Ok(geometry) => zones.push((zone.id.clone(), geometry)),
                Err(e) => report.record(
                    format!("{}/{}", layer.id, zone.id),
                    Stage::Overlay,
                    IssueKind::Geometry,
                    format!("zone dropped: {e}"),
                ),
            }
        }

        log::info!(
            "Indexed {} of {} zones in layer '{}'",
            zones.len(),
            layer.zones.len(),
            layer.id
        );

        Self {
            id: layer.id.clone(),
            min_overlap_ratio: layer.min_overlap_ratio,
            index: ZoneIndex::build(zones),
        }
    }

    /// Dominant zone of this layer for an already-repaired plot footprint.
    #[must_use]
    pub fn resolve(&self, footprint: &MultiPolygon<f64>, plot_area: f64) -> ZoneAssignment {
        let mut best: Option<(&index::ZoneEntry, f64)> = None;

        for entry in self.index.candidates(footprint) {
            let overlap = footprint.intersection(&entry.geometry).unsigned_area();
            if overlap <= TIE_EPSILON || overlap / plot_area <= self.min_overlap_ratio {
                continue;
            }
            // Candidates arrive in zone-id order, so only a strictly larger
            // overlap may displace the current best.
            match best {
                Some((_, best_overlap)) if overlap <= best_overlap + TIE_EPSILON => {}
                _ => best = Some((entry, overlap)),
            }
        }

        best.map_or(ZoneAssignment::NoZone, |(entry, overlap)| {
            ZoneAssignment::Dominant {
                zone: entry.id.clone(),
                overlap_area: overlap,
                overlap_ratio: (overlap / plot_area).min(1.0),
            }
        })
    }
}

/// Resolves the dominant zone of every layer for every plot.
///
/// # Errors
///
/// Returns [`OverlayError`] when plot identifiers or layer names are not
/// unique. Geometry problems are recorded in `report` instead.
pub fn resolve_overlay(
    plots: &[Plot],
    layers: &[RegulationZoneLayer],
    report: &mut QualityReport,
    progress: &dyn ProgressCallback,
) -> Result<PlotOverlayResult, OverlayError> {
    let mut layer_names = BTreeSet::new();
    for layer in layers {
        if !layer_names.insert(&layer.id) {
            return Err(OverlayError::DuplicateLayer(layer.id.clone()));
        }
    }

    let prepared: Vec<PreparedLayer> = layers
        .iter()
        .map(|layer| PreparedLayer::prepare(layer, report))
        .collect();

    progress.begin(Stage::Overlay, plots.len() as u64, prepared.len());

    let mut assignments: BTreeMap<PlotId, BTreeMap<LayerId, ZoneAssignment>> = BTreeMap::new();
    let mut unresolved = 0_usize;

    for plot in plots {
        if assignments.contains_key(&plot.id) {
            return Err(OverlayError::DuplicatePlot(plot.id.clone()));
        }

        let per_layer = match repair(&plot.geometry) {
            Ok(footprint) => {
                let plot_area = footprint.unsigned_area();
                prepared
                    .iter()
                    .map(|layer| (layer.id.clone(), layer.resolve(&footprint, plot_area)))
                    .collect()
            }
            Err(e) => {
                unresolved += 1;
                report.record(
                    plot.id.as_str(),
                    Stage::Overlay,
                    IssueKind::Geometry,
                    format!("plot unresolved in every layer: {e}"),
                );
                prepared
                    .iter()
                    .map(|layer| {
                        (
                            layer.id.clone(),
                            ZoneAssignment::Unresolved {
                                reason: e.to_string(),
                            },
                        )
                    })
                    .collect()
            }
        };

        assignments.insert(plot.id.clone(), per_layer);
        progress.advance(1);
    }

    progress.finish(format!(
        "Resolved {} plots against {} layers",
        plots.len(),
        prepared.len()
    ));
    log::info!(
        "Overlay resolved {} plots across {} layers ({unresolved} unresolved)",
        plots.len(),
        prepared.len()
    );

    Ok(PlotOverlayResult::new(assignments))
}

/// Resolves a single layer, e.g. an alternate layer for a scenario run.
///
/// # Errors
///
/// Returns [`OverlayError::DuplicatePlot`] when plot identifiers repeat.
pub fn resolve_layer(
    plots: &[Plot],
    layer: &RegulationZoneLayer,
    report: &mut QualityReport,
    progress: &dyn ProgressCallback,
) -> Result<PlotOverlayResult, OverlayError> {
    resolve_overlay(plots, std::slice::from_ref(layer), report, progress)
}
