//! R-tree over zone bounding boxes.

use geo::{BoundingRect, MultiPolygon};
use plot_gfa_zoning_models::ZoneId;
use rstar::{AABB, RTree, RTreeObject};

/// A repaired zone polygon stored in the R-tree.
pub struct ZoneEntry {
    /// Zone identifier.
    pub id: ZoneId,
    /// Repaired zone footprint.
    pub geometry: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over the zones of one layer.
pub struct ZoneIndex {
    tree: RTree<ZoneEntry>,
}

impl ZoneIndex {
    /// Bulk-loads the index from `(id, geometry)` pairs.
    #[must_use]
    pub fn build(zones: Vec<(ZoneId, MultiPolygon<f64>)>) -> Self {
        let entries = zones
            .into_iter()
            .map(|(id, geometry)| ZoneEntry {
                envelope: envelope_of(&geometry, 0.0),
                id,
                geometry,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Zones whose bounding box intersects the bounding box of `geometry`,
    /// sorted by zone identifier.
    #[must_use]
    pub fn candidates(&self, geometry: &MultiPolygon<f64>) -> Vec<&ZoneEntry> {
        let query = envelope_of(geometry, 0.0);
        let mut found: Vec<&ZoneEntry> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Number of indexed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Bounding box of `geometry` grown by `margin` on every side.
pub(crate) fn envelope_of(geometry: &MultiPolygon<f64>, margin: f64) -> AABB<[f64; 2]> {
    geometry.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| {
            AABB::from_corners(
                [rect.min().x - margin, rect.min().y - margin],
                [rect.max().x + margin, rect.max().y + margin],
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]])
    }

    #[test]
    fn candidates_are_filtered_by_envelope_and_sorted() {
        let index = ZoneIndex::build(vec![
            ("z3".into(), square(0.0, 0.0, 10.0)),
            ("z1".into(), square(5.0, 5.0, 10.0)),
            ("far".into(), square(100.0, 100.0, 10.0)),
        ]);
        assert_eq!(index.len(), 3);

        let ids: Vec<&str> = index
            .candidates(&square(6.0, 6.0, 2.0))
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["z1", "z3"]);
    }
}
