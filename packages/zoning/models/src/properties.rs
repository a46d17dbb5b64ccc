//! Derived plot properties: residential plot shape, road categories and
//! context plot ratios.

use geo::MultiLineString;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::PlotId;

/// Road network types that describe junctions or non-carriageways and are
/// never matched to a road plot.
pub const EXCLUDED_ROAD_TYPES: &[&str] = &[
    "Cross Junction",
    "T-Junction",
    "Expunged",
    "Other Junction",
    "Pedestrian Mall",
    "2 T-Junction opposite each other",
    "Unknown",
    "Y-Junction",
    "Imaginary Line",
];

/// One centreline of the road network.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    /// Road type code (e.g. `"Local Access"`).
    pub road_type: String,
    /// Centreline in the plots' projected system.
    pub geometry: MultiLineString<f64>,
}

/// Road category used by setback and access rules.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
pub enum RoadCategory {
    /// Expressways.
    #[strum(serialize = "1")]
    Category1,
    /// Semi-expressways and major or minor arterials.
    #[strum(serialize = "2-3")]
    Category2To3,
    /// Local collectors and primary access roads.
    #[strum(serialize = "4")]
    Category4,
    /// Local access, slip and service roads.
    #[strum(serialize = "5")]
    Category5,
    /// No road type, or one outside the classification.
    #[strum(serialize = "unknown")]
    Unknown,
}

impl RoadCategory {
    /// Category of a road type code.
    #[must_use]
    pub fn of(road_type: &str) -> Self {
        match road_type {
            "Expressway" => Self::Category1,
            "Semi Expressway" | "Major Arterials/Minor Arterials" => Self::Category2To3,
            "Local Collector/Primary Access" => Self::Category4,
            "Local Access" | "Slip Road" | "Service Road" => Self::Category5,
            _ => Self::Unknown,
        }
    }
}

/// Road attributes of a road plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadProperties {
    /// Road plot.
    pub plot: PlotId,
    /// Type of the road segment covering most of the plot.
    pub road_type: Option<String>,
    /// Category of `road_type`.
    pub category: RoadCategory,
}

/// Shape attributes of a residential plot.
///
/// Width and depth are measured on the plot's minimum rotated rectangle,
/// whose front edge is the one facing a road the most. Plots touching no
/// road have no front edge and so no corner flag, width or depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidentialProperties {
    /// Plot.
    pub plot: PlotId,
    /// The plot lies on the edge of a residential area.
    pub fringe: bool,
    /// Roads run along more than one non-rear edge.
    pub corner: Option<bool>,
    /// Median width (m) parallel to the front edge.
    pub average_width: Option<f64>,
    /// Median depth (m) perpendicular to the front edge.
    pub average_depth: Option<f64>,
}

/// Why a context plot ratio was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContextBasis {
    /// Inside a landed housing area with low-density surroundings.
    LandedHousing,
    /// Next to a landed housing area with low-density surroundings.
    LandedHousingFringe,
    /// Dense or industrial surroundings.
    Surroundings,
    /// Inside the central area, where the master plan ratio is dropped.
    CentralArea,
}

/// A plot ratio (and storey count) derived from a plot's surroundings for
/// zone types the master plan leaves open.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextGpr {
    /// Plot.
    pub plot: PlotId,
    /// Rule that applied.
    pub basis: ContextBasis,
    /// Assigned plot ratio; `None` clears the master plan ratio.
    pub plot_ratio: Option<f64>,
    /// Assigned storey count.
    pub storeys: Option<u32>,
}
