//! Polygon validity repair.
//!
//! Each member of a multipolygon is re-noded on its own by a boolean union
//! with the empty set, which fixes self-intersecting rings and duplicated
//! vertices. The members are then dissolved into each other one at a time,
//! so parts that overlap keep their shared area instead of cancelling out.
//! Geometry that is still empty afterwards (collinear rings, slivers)
//! cannot carry an overlap and is reported as unrepairable.

use geo::{Area, BooleanOps, CoordsIter, MultiPolygon, Validation};

/// Smallest area (m²) a repaired polygon may have.
pub const MIN_AREA: f64 = 1e-9;

/// Why a geometry could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairError {
    /// The geometry has no polygons.
    #[error("geometry is empty")]
    Empty,

    /// A coordinate is NaN or infinite.
    #[error("geometry has non-finite coordinates")]
    NonFinite,

    /// Nothing with a positive area remains after repair.
    #[error("geometry has zero area after repair")]
    ZeroArea,
}

/// Returns a valid copy of `geometry` with positive area.
///
/// Already-valid geometry is returned unchanged, so repair never moves a
/// well-formed boundary.
///
/// # Errors
///
/// Returns [`RepairError`] when the input is empty, contains non-finite
/// coordinates, or collapses to zero area.
pub fn repair(geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, RepairError> {
    if geometry.0.is_empty() {
        return Err(RepairError::Empty);
    }
    if geometry
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(RepairError::NonFinite);
    }

    if geometry.is_valid() && geometry.unsigned_area() > MIN_AREA {
        return Ok(geometry.clone());
    }

    let repaired = dissolve(geometry);
    if repaired.unsigned_area() > MIN_AREA {
        log::debug!(
            "Repaired geometry: {} -> {} polygons",
            geometry.0.len(),
            repaired.0.len()
        );
        Ok(repaired)
    } else {
        Err(RepairError::ZeroArea)
    }
}

/// Union of every member of `geometry`.
fn dissolve(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let empty = MultiPolygon::<f64>::new(vec![]);
    geometry
        .0
        .iter()
        .map(|member| MultiPolygon::new(vec![member.clone()]).union(&empty))
        .fold(empty.clone(), |merged, part| merged.union(&part))
}
