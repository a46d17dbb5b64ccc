#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the plot GFA pipeline.
//!
//! Every stage of the pipeline (overlay, normalization, linking, GFA
//! computation) produces immutable values of the types defined here and
//! hands them read-only to the next stage. Identifiers are string
//! newtypes whose lexicographic order doubles as the deterministic
//! ordering used for tie-breaks and for every emitted table.

pub mod constraint;
pub mod properties;
pub mod quality;
pub mod records;
pub mod result;

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

pub use constraint::{ConstraintKind, LayerTheme, Unit};
pub use properties::{
    ContextBasis, ContextGpr, EXCLUDED_ROAD_TYPES, ResidentialProperties, RoadCategory,
    RoadProperties, RoadSegment,
};
pub use quality::{IssueKind, QualityIssue, QualityReport, Stage};
pub use records::{
    AreaRegulationRecord, MAX_STOREYS, PlotConstraintBundle, PlotConstraintBundleSet,
    TypeRegulationRecord,
};
pub use result::{AllowableGfaResult, GfaStatus, PlotOverlayResult, ZoneAssignment};

/// Layer name reserved for constraints carried by the plot itself (the
/// master plan plot ratio attribute).
pub const MASTERPLAN_LAYER: &str = "masterplan";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw identifier string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a land plot (e.g. a master plan city object IRI).
    PlotId
);
string_id!(
    /// Identifier of one zone polygon within a regulation layer.
    ZoneId
);
string_id!(
    /// Name of a regulation zone layer (e.g. `"height_control"`).
    LayerId
);
string_id!(
    /// Permitted use / programme type of a plot (e.g. `"Flat"`).
    UseType
);

impl LayerId {
    /// The reserved layer carrying plot-intrinsic constraints.
    #[must_use]
    pub fn masterplan() -> Self {
        Self::new(MASTERPLAN_LAYER)
    }
}

/// Descriptive attributes of a plot as loaded from the plot source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotAttributes {
    /// Master plan zoning type (e.g. `"RESIDENTIAL"`).
    pub zone_type: Option<String>,
    /// Permitted use type used to join type-based regulations.
    pub use_type: Option<UseType>,
    /// Master plan gross plot ratio, when the plan states one.
    pub plot_ratio: Option<f64>,
    /// Planar area of the plot geometry in square metres.
    pub gross_area: f64,
}

/// A land plot. Created once by ingestion and only ever borrowed
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    /// Unique plot identifier.
    pub id: PlotId,
    /// Plot footprint in a projected (metre-based) coordinate system.
    pub geometry: MultiPolygon<f64>,
    /// Plot attributes.
    pub attributes: PlotAttributes,
}

/// One zone polygon of a regulation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePolygon {
    /// Zone identifier, the join key into the area regulation table.
    pub id: ZoneId,
    /// Zone footprint in the same projected system as the plots.
    pub geometry: MultiPolygon<f64>,
    /// Theme-specific attributes (height tier, control level, ...).
    pub attributes: BTreeMap<String, String>,
}

/// A named collection of zone polygons for one regulatory theme.
#[derive(Debug, Clone, PartialEq)]
pub struct RegulationZoneLayer {
    /// Layer name.
    pub id: LayerId,
    /// Regulatory theme of the layer.
    pub theme: LayerTheme,
    /// Minimum `overlap / plot area` a zone must exceed to apply to a plot.
    pub min_overlap_ratio: f64,
    /// Zone polygons.
    pub zones: Vec<ZonePolygon>,
}

impl RegulationZoneLayer {
    /// Creates a layer with no minimum overlap ratio.
    #[must_use]
    pub fn new(id: impl Into<LayerId>, theme: LayerTheme, zones: Vec<ZonePolygon>) -> Self {
        Self {
            id: id.into(),
            theme,
            min_overlap_ratio: 0.0,
            zones,
        }
    }

    /// Sets the minimum overlap ratio.
    #[must_use]
    pub fn with_min_overlap_ratio(mut self, ratio: f64) -> Self {
        self.min_overlap_ratio = ratio;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_lexicographically() {
        let mut zones = vec![ZoneId::from("z10"), ZoneId::from("z02"), ZoneId::from("a")];
        zones.sort();
        assert_eq!(
            zones.iter().map(ZoneId::as_str).collect::<Vec<_>>(),
            vec!["a", "z02", "z10"]
        );
    }

    #[test]
    fn masterplan_layer_name() {
        assert_eq!(LayerId::masterplan().as_str(), MASTERPLAN_LAYER);
    }
}
