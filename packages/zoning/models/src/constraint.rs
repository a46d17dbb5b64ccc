//! Constraint-kind and layer-theme enumerations.
//!
//! These are the fixed tags the table normalizer emits and the linker,
//! GFA engine and quad emitter consume. They stand in for the class and
//! property identifiers of the planning regulation ontology.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Unit a constraint value is expressed in after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Unit {
    /// Dimensionless ratio (GFA / site area).
    Ratio,
    /// Fraction of the site area in `[0, 1]`.
    Fraction,
    /// Count of storeys.
    Storeys,
    /// Metres.
    Metre,
    /// Square metres.
    SquareMetre,
}

/// Kind of a normalized regulatory constraint.
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
pub enum ConstraintKind {
    // ── Area-based ──────────────────────────────────────
    /// Gross plot ratio (allowable GFA / site area)
    PlotRatio,
    /// Maximum share of the site a building footprint may cover
    SiteCoverage,
    /// Maximum number of storeys
    StoreyLimit,
    /// Maximum absolute building height
    AbsoluteHeight,
    /// Floor-to-floor height used to convert heights into storeys
    FloorToFloorHeight,
    /// Required setback from the plot boundary
    Setback,
    /// Absolute cap on gross floor area
    MaxGrossFloorArea,

    // ── Type-based ──────────────────────────────────────
    /// Floor area allowed on one storey
    StoreyFloorArea,
    /// Share of the site area allowed on one storey
    StoreyCoverage,
}

impl ConstraintKind {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PlotRatio,
            Self::SiteCoverage,
            Self::StoreyLimit,
            Self::AbsoluteHeight,
            Self::FloorToFloorHeight,
            Self::Setback,
            Self::MaxGrossFloorArea,
            Self::StoreyFloorArea,
            Self::StoreyCoverage,
        ]
    }

    /// Whether the constraint is attached through a zone polygon.
    #[must_use]
    pub const fn is_area_based(self) -> bool {
        !self.is_type_based()
    }

    /// Whether the constraint is attached through a use type and storey.
    #[must_use]
    pub const fn is_type_based(self) -> bool {
        matches!(self, Self::StoreyFloorArea | Self::StoreyCoverage)
    }

    /// Whether the constraint bounds building height.
    #[must_use]
    pub const fn is_height_based(self) -> bool {
        matches!(
            self,
            Self::StoreyLimit | Self::AbsoluteHeight | Self::FloorToFloorHeight
        )
    }

    /// Unit of the normalized value.
    #[must_use]
    pub const fn unit(self) -> Unit {
        match self {
            Self::PlotRatio => Unit::Ratio,
            Self::SiteCoverage | Self::StoreyCoverage => Unit::Fraction,
            Self::StoreyLimit => Unit::Storeys,
            Self::AbsoluteHeight | Self::FloorToFloorHeight | Self::Setback => Unit::Metre,
            Self::MaxGrossFloorArea | Self::StoreyFloorArea => Unit::SquareMetre,
        }
    }
}

/// Regulatory theme of a zone layer.
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
pub enum LayerTheme {
    /// Height control plan
    HeightControl,
    /// Conservation area
    ConservationArea,
    /// Central area
    CentralArea,
    /// Monument
    Monument,
    /// Planning boundary
    PlanningBoundary,
    /// Landed housing area
    LandedHousingArea,
    /// Street block plan
    StreetBlockPlan,
    /// Urban design guideline
    UrbanDesignGuideline,
    /// Urban design area
    UrbanDesignArea,
    /// Any other zone layer
    Other,
}

impl LayerTheme {
    /// Ontology class name of regulations in this theme.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::HeightControl => "HeightControlPlan",
            Self::ConservationArea => "ConservationArea",
            Self::CentralArea => "CentralArea",
            Self::Monument => "Monument",
            Self::PlanningBoundary => "PlanningBoundary",
            Self::LandedHousingArea => "LandedHousingArea",
            Self::StreetBlockPlan => "StreetBlockPlan",
            Self::UrbanDesignGuideline => "UrbanDesignGuideline",
            Self::UrbanDesignArea => "UrbanDesignArea",
            Self::Other => "AreaBasedRegulation",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn kinds_are_either_area_or_type_based() {
        for kind in ConstraintKind::all() {
            assert_ne!(kind.is_area_based(), kind.is_type_based(), "{kind:?}");
        }
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in ConstraintKind::all() {
            let parsed = ConstraintKind::from_str(kind.as_ref()).unwrap();
            assert_eq!(parsed, *kind);
        }
        assert_eq!(ConstraintKind::PlotRatio.to_string(), "plot_ratio");
    }

    #[test]
    fn theme_parses_from_config_names() {
        assert_eq!(
            LayerTheme::from_str("height_control").unwrap(),
            LayerTheme::HeightControl
        );
        assert!(LayerTheme::from_str("nope").is_err());
    }
}
