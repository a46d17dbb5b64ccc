//! Plot enrichment: site areas and neighbour links.

use std::collections::BTreeMap;

use geo::{Area, Distance, Euclidean, MultiPolygon};
use plot_gfa_zoning_models::{Plot, PlotId};
use rstar::{AABB, RTree, RTreeObject};

use crate::index::envelope_of;

/// Planar area of a plot footprint in square metres.
#[must_use]
pub fn site_area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

pub(crate) struct PlotEntry<'a> {
    pub(crate) plot: &'a Plot,
    envelope: AABB<[f64; 2]>,
}

impl<'a> PlotEntry<'a> {
    pub(crate) fn new(plot: &'a Plot, margin: f64) -> Self {
        Self {
            plot,
            envelope: envelope_of(&plot.geometry, margin),
        }
    }
}

impl RTreeObject for PlotEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pairs of plots whose boundaries are at most `distance` metres apart.
///
/// Each pair appears once as `(lower id, higher id)` and the list is
/// sorted; self links never appear.
#[must_use]
pub fn neighbour_links(plots: &[Plot], distance: f64) -> Vec<(PlotId, PlotId)> {
    let margin = distance.max(0.0);
    let tree = RTree::bulk_load(
        plots
            .iter()
            .map(|plot| PlotEntry::new(plot, margin))
            .collect(),
    );

    let mut links: BTreeMap<PlotId, Vec<PlotId>> = BTreeMap::new();
    let mut count = 0_usize;

    for plot in plots {
        let query = envelope_of(&plot.geometry, margin);
        for candidate in tree.locate_in_envelope_intersecting(&query) {
            let other = candidate.plot;
            if other.id <= plot.id {
                continue;
            }
            if boundary_distance(&plot.geometry, &other.geometry) <= margin {
                links
                    .entry(plot.id.clone())
                    .or_default()
                    .push(other.id.clone());
                count += 1;
            }
        }
    }

    log::info!(
        "Found {count} neighbour pairs among {} plots (within {margin} m)",
        plots.len()
    );

    links
        .into_iter()
        .flat_map(|(a, mut others)| {
            others.sort();
            others.dedup();
            others.into_iter().map(move |b| (a.clone(), b))
        })
        .collect()
}

fn boundary_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.0.iter()
        .flat_map(|pa| b.0.iter().map(move |pb| Euclidean.distance(pa, pb)))
        .fold(f64::INFINITY, f64::min)
}
