//! Residential plot shape and road plot attributes.
//!
//! Residential areas are traced by growing every residential plot, merging
//! the result, filling small holes and shrinking it back. A plot that,
//! grown by the fringe margin, sticks out of its area is a fringe plot.
//!
//! Corner status, width and depth are read off the plot's minimum rotated
//! rectangle. A thin strip along each rectangle edge is intersected with
//! the road plots; the edge with the largest road contact is the front,
//! the opposite edge the rear, and a plot is a corner plot when roads
//! cover enough of more than one non-rear strip.

use std::collections::BTreeSet;

use geo::{
    Area, BooleanOps, Buffer, Coord, Euclidean, Length, Line, LineString, MinimumRotatedRect,
    MultiLineString, MultiPolygon, Polygon, Simplify, unary_union,
};
use plot_gfa_zoning_models::{
    EXCLUDED_ROAD_TYPES, Plot, ResidentialProperties, RoadCategory, RoadProperties, RoadSegment,
    ZoneId,
};
use rstar::{AABB, RTree, RTreeObject};

use crate::enrich::PlotEntry;
use crate::index::{ZoneIndex, envelope_of};

/// Lines sampled per width or depth measurement.
const SAMPLES: u32 = 10;

/// Tolerance (m) used when simplifying a traced residential area.
const AREA_SIMPLIFY: f64 = 0.5;

/// Distances and ratios used to derive residential plot properties.
#[derive(Debug, Clone, Copy)]
pub struct ShapeSettings {
    /// Growth (m) that closes gaps between residential plots.
    pub closing_distance: f64,
    /// Holes (m²) larger than this stay holes in a residential area.
    pub hole_area: f64,
    /// Growth (m) tested against the residential area.
    pub fringe_margin: f64,
    /// Half-width (m) of each edge strip.
    pub edge_buffer: f64,
    /// Share of a strip a road must cover for its edge to face the road.
    pub corner_overlap_ratio: f64,
}

/// Outline of the residential areas formed by `plots`.
#[must_use]
pub fn residential_area(
    plots: &[&Plot],
    closing_distance: f64,
    hole_area: f64,
) -> MultiPolygon<f64> {
    let grown: Vec<MultiPolygon<f64>> = plots
        .iter()
        .map(|plot| plot.geometry.buffer(closing_distance))
        .collect();

    let filled: MultiPolygon<f64> = unary_union(&grown)
        .0
        .into_iter()
        .map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            let kept = interiors
                .into_iter()
                .filter(|ring| Polygon::new(ring.clone(), vec![]).unsigned_area() > hole_area)
                .collect();
            Polygon::new(exterior, kept)
        })
        .collect();

    filled.simplify(AREA_SIMPLIFY).buffer(-closing_distance)
}

/// Fringe, corner, width and depth of every residential plot, in plot
/// order.
#[must_use]
pub fn residential_properties(
    residential: &[&Plot],
    roads: &[&Plot],
    settings: &ShapeSettings,
) -> Vec<ResidentialProperties> {
    let area = residential_area(residential, settings.closing_distance, settings.hole_area);
    log::debug!("Residential plots form {} areas", area.0.len());
    let parts = ZoneIndex::build(
        area.0
            .into_iter()
            .enumerate()
            .map(|(i, part)| (ZoneId::new(format!("area{i}")), MultiPolygon::new(vec![part])))
            .collect(),
    );
    let road_tree = RTree::bulk_load(roads.iter().map(|plot| PlotEntry::new(plot, 0.0)).collect());

    let mut properties: Vec<ResidentialProperties> = residential
        .iter()
        .map(|plot| {
            let fringe = is_fringe(&plot.geometry, &parts, settings.fringe_margin);
            let shape = rectangle_edges(&plot.geometry)
                .and_then(|edges| PlotShape::measure(plot, &edges, &road_tree, settings));
            ResidentialProperties {
                plot: plot.id.clone(),
                fringe,
                corner: shape.as_ref().map(|s| s.corner),
                average_width: shape.as_ref().map(|s| s.width),
                average_depth: shape.as_ref().map(|s| s.depth),
            }
        })
        .collect();
    properties.sort_by(|a, b| a.plot.cmp(&b.plot));

    log::info!(
        "Residential properties: {} plots, {} at the fringe, {} corner plots",
        properties.len(),
        properties.iter().filter(|p| p.fringe).count(),
        properties.iter().filter(|p| p.corner == Some(true)).count()
    );

    properties
}

fn is_fringe(geometry: &MultiPolygon<f64>, area: &ZoneIndex, margin: f64) -> bool {
    let grown = geometry.buffer(margin);
    let inside: f64 = area
        .candidates(&grown)
        .iter()
        .map(|part| grown.intersection(&part.geometry).unsigned_area())
        .sum();
    inside.round() < grown.unsigned_area().round()
}

/// The four edges of the minimum rotated rectangle, in ring order.
fn rectangle_edges(geometry: &MultiPolygon<f64>) -> Option<[Line<f64>; 4]> {
    let rectangle = geometry.minimum_rotated_rect()?;
    let edges: Vec<Line<f64>> = rectangle
        .exterior()
        .lines()
        .filter(|line| Euclidean.length(line) > 0.0)
        .collect();
    edges.try_into().ok()
}

fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x.mul_add(b.x, a.y * b.y)
}

/// Unit normal of `edge` pointing toward `centre`.
fn inward_normal(edge: &Line<f64>, centre: Coord<f64>) -> Coord<f64> {
    let along = edge.delta() / Euclidean.length(edge);
    let normal = Coord {
        x: -along.y,
        y: along.x,
    };
    if dot(centre - edge.start, normal) < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Strip of half-width `half_width` around `edge`, with square ends.
fn edge_strip(edge: &Line<f64>, half_width: f64) -> MultiPolygon<f64> {
    let along = edge.delta() / Euclidean.length(edge);
    let offset = Coord {
        x: -along.y,
        y: along.x,
    } * half_width;
    let start = edge.start - along * half_width;
    let end = edge.end + along * half_width;

    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![
            start + offset,
            end + offset,
            end - offset,
            start - offset,
            start + offset,
        ]),
        vec![],
    )])
}

/// Median length of `geometry` cut by lines parallel to `base`, spread
/// evenly over `extent` toward `normal`. Rounded to the millimetre.
fn median_span(
    geometry: &MultiPolygon<f64>,
    base: &Line<f64>,
    normal: Coord<f64>,
    extent: f64,
) -> f64 {
    let mut spans: Vec<f64> = (1..=SAMPLES)
        .map(|k| {
            let shift = normal * (extent * f64::from(k) / f64::from(SAMPLES + 1));
            let line = LineString::from(vec![base.start + shift, base.end + shift]);
            Euclidean.length(&geometry.clip(&MultiLineString::new(vec![line]), false))
        })
        .collect();
    spans.sort_by(f64::total_cmp);

    let mid = spans.len() / 2;
    let median = (spans[mid - 1] + spans[mid]) / 2.0;
    (median * 1000.0).round() / 1000.0
}

struct PlotShape {
    corner: bool,
    width: f64,
    depth: f64,
}

impl PlotShape {
    /// `None` when no edge touches a road plot.
    fn measure(
        plot: &Plot,
        edges: &[Line<f64>; 4],
        roads: &RTree<PlotEntry<'_>>,
        settings: &ShapeSettings,
    ) -> Option<Self> {
        // (edge, contact area, contact share) per edge and road plot.
        let mut contacts: Vec<(usize, f64, f64)> = Vec::new();
        for (i, edge) in edges.iter().enumerate() {
            let strip = edge_strip(edge, settings.edge_buffer);
            let strip_area = strip.unsigned_area();
            if strip_area <= 0.0 {
                continue;
            }
            for road in roads.locate_in_envelope_intersecting(&envelope_of(&strip, 0.0)) {
                let contact = strip.intersection(&road.plot.geometry).unsigned_area();
                if contact > 0.0 {
                    contacts.push((i, contact, contact / strip_area));
                }
            }
        }

        let lengths = edges.map(|edge| Euclidean.length(&edge));
        let front = contacts
            .iter()
            .copied()
            .reduce(|best, next| {
                let better = next
                    .1
                    .total_cmp(&best.1)
                    .then_with(|| lengths[next.0].total_cmp(&lengths[best.0]))
                    .then_with(|| best.0.cmp(&next.0));
                if better.is_gt() { next } else { best }
            })?
            .0;
        let rear = (front + 2) % 4;
        let side = (front + 1) % 4;

        let facing: BTreeSet<usize> = contacts
            .iter()
            .filter(|(edge, _, share)| *edge != rear && *share > settings.corner_overlap_ratio)
            .map(|(edge, _, _)| *edge)
            .collect();

        let centre = (edges[0].start + edges[2].start) / 2.0;
        let width = median_span(
            &plot.geometry,
            &edges[front],
            inward_normal(&edges[front], centre),
            lengths[side],
        );
        let depth = median_span(
            &plot.geometry,
            &edges[side],
            inward_normal(&edges[side], centre),
            lengths[front],
        );

        Some(Self {
            corner: facing.len() > 1,
            width,
            depth,
        })
    }
}

struct CorridorEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CorridorEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Road type and category of every road plot, in plot order.
///
/// Each road centreline is widened by `buffer` metres; a plot takes the
/// type of the widened road covering most of it, the lowest type name on
/// a tie. Junctions and other excluded types are ignored.
#[must_use]
pub fn road_properties(
    road_plots: &[&Plot],
    segments: &[RoadSegment],
    buffer: f64,
) -> Vec<RoadProperties> {
    let corridors: Vec<(&str, MultiPolygon<f64>)> = segments
        .iter()
        .filter(|s| !EXCLUDED_ROAD_TYPES.contains(&s.road_type.as_str()))
        .map(|s| (s.road_type.as_str(), s.geometry.buffer(buffer)))
        .collect();
    log::debug!(
        "{} of {} road segments are carriageways",
        corridors.len(),
        segments.len()
    );

    let tree = RTree::bulk_load(
        corridors
            .iter()
            .enumerate()
            .map(|(index, (_, corridor))| CorridorEntry {
                index,
                envelope: envelope_of(corridor, 0.0),
            })
            .collect(),
    );

    let mut properties: Vec<RoadProperties> = road_plots
        .iter()
        .map(|plot| {
            let mut best: Option<(f64, &str)> = None;
            for entry in tree.locate_in_envelope_intersecting(&envelope_of(&plot.geometry, 0.0)) {
                let (road_type, corridor) = &corridors[entry.index];
                let overlap = plot.geometry.intersection(corridor).unsigned_area();
                if overlap <= 0.0 {
                    continue;
                }
                let better = best.is_none_or(|(area, kept)| {
                    overlap
                        .total_cmp(&area)
                        .then_with(|| kept.cmp(road_type))
                        .is_gt()
                });
                if better {
                    best = Some((overlap, *road_type));
                }
            }

            let road_type = best.map(|(_, road_type)| road_type.to_string());
            RoadProperties {
                plot: plot.id.clone(),
                category: road_type.as_deref().map_or(RoadCategory::Unknown, RoadCategory::of),
                road_type,
            }
        })
        .collect();
    properties.sort_by(|a, b| a.plot.cmp(&b.plot));

    let typed = properties.iter().filter(|p| p.road_type.is_some()).count();
    log::info!("Matched road types to {typed} of {} road plots", properties.len());

    properties
}

#[cfg(test)]
mod tests {
    use geo::{line_string, polygon};
    use plot_gfa_zoning_models::PlotAttributes;

    use super::*;

    fn plot(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Plot {
        Plot {
            id: id.into(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: y0),
                (x: x1, y: y0),
                (x: x1, y: y1),
                (x: x0, y: y1),
                (x: x0, y: y0),
            ]]),
            attributes: PlotAttributes::default(),
        }
    }

    fn settings() -> ShapeSettings {
        ShapeSettings {
            closing_distance: 5.0,
            hole_area: 100.0,
            fringe_margin: 2.0,
            edge_buffer: 3.0,
            corner_overlap_ratio: 0.3,
        }
    }

    fn road(road_type: &str, y: f64) -> RoadSegment {
        RoadSegment {
            road_type: road_type.to_string(),
            geometry: MultiLineString::new(vec![line_string![(x: 0.0, y: y), (x: 100.0, y: y)]]),
        }
    }

    #[test]
    fn only_edge_plots_of_a_block_are_fringe() {
        let block: Vec<Plot> = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| {
                let (x, y) = (f64::from(i) * 20.0, f64::from(j) * 20.0);
                plot(&format!("p{i}{j}"), x, y, x + 20.0, y + 20.0)
            })
            .collect();
        let residential: Vec<&Plot> = block.iter().collect();

        let properties = residential_properties(&residential, &[], &settings());
        assert_eq!(properties.len(), 9);
        for p in &properties {
            assert_eq!(p.fringe, p.plot.as_str() != "p11", "{}", p.plot);
            assert!(p.corner.is_none());
            assert!(p.average_width.is_none());
        }
    }

    #[test]
    fn plot_on_one_road_is_not_a_corner() {
        let house = plot("house", 0.0, 0.0, 20.0, 30.0);
        let south = plot("south", -50.0, -10.0, 50.0, 0.0);

        let properties = residential_properties(&[&house], &[&south], &settings());
        let house = &properties[0];
        assert_eq!(house.corner, Some(false));
        // The front faces the southern road, so width runs east-west.
        assert!((house.average_width.unwrap() - 20.0).abs() < 1e-3);
        assert!((house.average_depth.unwrap() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn plot_between_two_roads_is_a_corner() {
        let house = plot("house", 0.0, 0.0, 20.0, 30.0);
        let south = plot("south", -50.0, -10.0, 50.0, 0.0);
        let west = plot("west", -10.0, -10.0, 0.0, 50.0);

        let properties = residential_properties(&[&house], &[&south, &west], &settings());
        let house = &properties[0];
        assert_eq!(house.corner, Some(true));
        // The western contact is the larger, so the front is the long edge.
        assert!((house.average_width.unwrap() - 30.0).abs() < 1e-3);
        assert!((house.average_depth.unwrap() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn road_plots_take_the_type_covering_most_of_them() {
        let main = plot("main", 0.0, 0.0, 100.0, 20.0);
        let lane = plot("lane", 200.0, 0.0, 300.0, 20.0);
        let segments = vec![
            road("T-Junction", 10.0),
            road("Local Access", 10.0),
            road("Expressway", 25.0),
        ];

        let properties = road_properties(&[&main, &lane], &segments, 5.0);
        assert_eq!(properties.len(), 2);

        assert_eq!(properties[0].plot.as_str(), "lane");
        assert_eq!(properties[0].road_type, None);
        assert_eq!(properties[0].category, RoadCategory::Unknown);

        assert_eq!(properties[1].road_type.as_deref(), Some("Local Access"));
        assert_eq!(properties[1].category, RoadCategory::Category5);
    }
}
