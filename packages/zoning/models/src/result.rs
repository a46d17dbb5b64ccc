//! Overlay assignments and allowable GFA results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{ConstraintKind, LayerId, PlotId, ZoneId};

/// Outcome of resolving one (plot, layer) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneAssignment {
    /// The zone with the largest qualifying overlap.
    Dominant {
        /// Winning zone.
        zone: ZoneId,
        /// Intersection area in square metres.
        overlap_area: f64,
        /// Intersection area divided by plot area.
        overlap_ratio: f64,
    },
    /// No zone of the layer overlaps the plot.
    NoZone,
    /// The plot geometry could not be repaired for this layer.
    Unresolved {
        /// Why resolution failed.
        reason: String,
    },
}

impl ZoneAssignment {
    /// The dominant zone, if one was found.
    #[must_use]
    pub const fn zone(&self) -> Option<&ZoneId> {
        match self {
            Self::Dominant { zone, .. } => Some(zone),
            Self::NoZone | Self::Unresolved { .. } => None,
        }
    }

    /// Whether the assignment failed on geometry.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Dominant zone per layer for every plot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotOverlayResult {
    assignments: BTreeMap<PlotId, BTreeMap<LayerId, ZoneAssignment>>,
}

impl PlotOverlayResult {
    /// Builds a result from per-plot assignments.
    #[must_use]
    pub const fn new(assignments: BTreeMap<PlotId, BTreeMap<LayerId, ZoneAssignment>>) -> Self {
        Self { assignments }
    }

    /// Assignment for a (plot, layer) pair.
    #[must_use]
    pub fn get(&self, plot: &PlotId, layer: &LayerId) -> Option<&ZoneAssignment> {
        self.assignments.get(plot)?.get(layer)
    }

    /// All layer assignments of a plot, ordered by layer.
    #[must_use]
    pub fn layers_for(&self, plot: &PlotId) -> Option<&BTreeMap<LayerId, ZoneAssignment>> {
        self.assignments.get(plot)
    }

    /// Iterates plots in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlotId, &BTreeMap<LayerId, ZoneAssignment>)> {
        self.assignments.iter()
    }

    /// Number of plots covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no plot is covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Returns a new result where every plot's assignment for `layer` is
    /// taken from `replacement`. `self` is left untouched; plots missing
    /// from `replacement` lose their assignment for that layer.
    #[must_use]
    pub fn with_layer_replaced(&self, layer: &LayerId, replacement: &Self) -> Self {
        let assignments = self
            .assignments
            .iter()
            .map(|(plot, layers)| {
                let mut layers = layers.clone();
                layers.remove(layer);
                if let Some(assignment) = replacement.get(plot, layer) {
                    layers.insert(layer.clone(), assignment.clone());
                }
                (plot.clone(), layers)
            })
            .collect();

        Self { assignments }
    }
}

/// Outcome classification of an allowable GFA computation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GfaStatus {
    /// A value was computed from consistent constraints.
    Ok,
    /// No constraint produced a candidate; the GFA is unset.
    MissingData,
    /// Area- and type-based candidates disagree beyond the tolerance.
    ConflictingConstraints,
}

/// Final allowable GFA of one plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowableGfaResult {
    /// Plot the result belongs to.
    pub plot: PlotId,
    /// Allowable GFA in square metres; `None` when data is missing.
    pub allowable_gfa: Option<f64>,
    /// Candidate derived from plot ratio / coverage / storeys.
    pub area_candidate: Option<f64>,
    /// Candidate derived from per-storey type allocations.
    pub type_candidate: Option<f64>,
    /// Storeys implied by height-based constraints.
    pub permitted_storeys: Option<u32>,
    /// Constraint kinds that fed a candidate, sorted and deduplicated.
    pub contributing: Vec<ConstraintKind>,
    /// Result classification.
    pub status: GfaStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant(zone: &str) -> ZoneAssignment {
        ZoneAssignment::Dominant {
            zone: zone.into(),
            overlap_area: 10.0,
            overlap_ratio: 1.0,
        }
    }

    #[test]
    fn replacing_a_layer_leaves_the_baseline_untouched() {
        let mut layers = BTreeMap::new();
        layers.insert(LayerId::from("height"), dominant("h1"));
        layers.insert(LayerId::from("central"), dominant("c1"));
        let mut plots = BTreeMap::new();
        plots.insert(PlotId::from("p1"), layers);
        let baseline = PlotOverlayResult::new(plots);

        let mut alt_layers = BTreeMap::new();
        alt_layers.insert(LayerId::from("height"), dominant("h9"));
        let mut alt = BTreeMap::new();
        alt.insert(PlotId::from("p1"), alt_layers);
        let alternate = PlotOverlayResult::new(alt);

        let scenario = baseline.with_layer_replaced(&LayerId::from("height"), &alternate);

        let p1 = PlotId::from("p1");
        assert_eq!(
            scenario.get(&p1, &"height".into()).and_then(ZoneAssignment::zone),
            Some(&ZoneId::from("h9"))
        );
        assert_eq!(
            scenario.get(&p1, &"central".into()).and_then(ZoneAssignment::zone),
            Some(&ZoneId::from("c1"))
        );
        assert_eq!(
            baseline.get(&p1, &"height".into()).and_then(ZoneAssignment::zone),
            Some(&ZoneId::from("h1"))
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(GfaStatus::MissingData.to_string(), "missing_data");
        assert_eq!(
            GfaStatus::ConflictingConstraints.as_ref(),
            "conflicting_constraints"
        );
    }
}
