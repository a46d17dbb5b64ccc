//! Normalized regulation records and the per-plot constraint bundle.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ConstraintKind, LayerId, PlotId, UseType, ZoneId};

/// Highest storey a regulation may name or a plot may be permitted.
pub const MAX_STOREYS: u32 = 200;

/// A constraint tied to one zone of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRegulationRecord {
    /// Layer the zone belongs to.
    pub layer: LayerId,
    /// Zone the constraint applies to.
    pub zone: ZoneId,
    /// Constraint kind (always area-based).
    pub kind: ConstraintKind,
    /// Normalized, finite, non-negative value in the kind's unit.
    pub value: f64,
}

impl AreaRegulationRecord {
    /// Canonical ordering: layer, zone, kind, then value.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        (&self.layer, &self.zone, self.kind)
            .cmp(&(&other.layer, &other.zone, other.kind))
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

/// A floor-area allocation tied to a use type and one storey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRegulationRecord {
    /// Use type the allocation applies to.
    pub use_type: UseType,
    /// One-based storey number.
    pub storey: u32,
    /// [`ConstraintKind::StoreyFloorArea`] or [`ConstraintKind::StoreyCoverage`].
    pub kind: ConstraintKind,
    /// Normalized value in the kind's unit.
    pub value: f64,
    /// The allocation also applies to every storey above `storey`.
    pub open_ended: bool,
}

impl TypeRegulationRecord {
    /// Canonical ordering: use type, storey, kind, open-endedness, value.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        (&self.use_type, self.storey, self.kind, self.open_ended)
            .cmp(&(&other.use_type, other.storey, other.kind, other.open_ended))
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

/// Every constraint attached to one plot by the regulation linker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConstraintBundle {
    /// Plot the bundle belongs to.
    pub plot: PlotId,
    /// Master plan zone type of the plot.
    pub zone_type: Option<String>,
    /// Plot use type the type-based join used.
    pub use_type: Option<UseType>,
    /// Site area in square metres.
    pub site_area: f64,
    /// Area-based records, in canonical order.
    pub area_records: Vec<AreaRegulationRecord>,
    /// Type-based records, in canonical order.
    pub type_records: Vec<TypeRegulationRecord>,
    /// Layers with a dominant zone but no matching regulation record.
    pub absent_layers: Vec<LayerId>,
    /// Layers whose overlay could not be resolved for this plot.
    pub unresolved_layers: Vec<LayerId>,
}

impl PlotConstraintBundle {
    /// Whether no constraint of any kind is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area_records.is_empty() && self.type_records.is_empty()
    }

    /// Values attached for `kind` from area-based records.
    pub fn area_values(&self, kind: ConstraintKind) -> impl Iterator<Item = f64> + '_ {
        self.area_records
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| r.value)
    }

    /// The most restrictive (smallest) value attached for `kind`.
    #[must_use]
    pub fn most_restrictive(&self, kind: ConstraintKind) -> Option<f64> {
        self.area_values(kind).min_by(f64::total_cmp)
    }
}

/// Constraint bundles of every plot, ordered by plot identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotConstraintBundleSet {
    bundles: BTreeMap<PlotId, PlotConstraintBundle>,
}

impl PlotConstraintBundleSet {
    /// Builds a set from bundles; a later bundle for the same plot wins.
    #[must_use]
    pub fn from_bundles(bundles: impl IntoIterator<Item = PlotConstraintBundle>) -> Self {
        Self {
            bundles: bundles.into_iter().map(|b| (b.plot.clone(), b)).collect(),
        }
    }

    /// Bundle of one plot.
    #[must_use]
    pub fn get(&self, plot: &PlotId) -> Option<&PlotConstraintBundle> {
        self.bundles.get(plot)
    }

    /// Mutable bundle of one plot.
    pub fn get_mut(&mut self, plot: &PlotId) -> Option<&mut PlotConstraintBundle> {
        self.bundles.get_mut(plot)
    }

    /// Iterates bundles in plot order.
    pub fn iter(&self) -> impl Iterator<Item = &PlotConstraintBundle> {
        self.bundles.values()
    }

    /// Number of plots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
