//! Surroundings-based plot ratios.
//!
//! The master plan leaves the plot ratio of some institutional zone types
//! open; it then follows from what lies around the plot. A plot inside a
//! landed housing area gets the landed ratio and that area's storeys, one
//! next to such an area gets the fringe ratio, and one among dense or
//! industrial neighbours gets the context ratio. Low-density surroundings
//! are tested first, so a landed plot among dense neighbours takes the
//! context ratio. A plot in the central area with none of these loses its
//! master plan ratio.

use std::collections::{BTreeMap, BTreeSet};

use plot_gfa_config::ContextGprConfig;
use plot_gfa_regulation::RegulationIndex;
use plot_gfa_zoning_models::{
    AreaRegulationRecord, ConstraintKind, ContextBasis, ContextGpr, LayerId, LayerTheme, Plot,
    PlotConstraintBundleSet, PlotId, PlotOverlayResult, RegulationZoneLayer, ZoneAssignment,
    ZoneId,
};

/// Where each plot sits: its dominant zones by theme, the programmes those
/// zones allow and its neighbours.
pub struct Surroundings<'a> {
    overlay: &'a PlotOverlayResult,
    themes: &'a BTreeMap<LayerId, LayerTheme>,
    programmes: BTreeMap<(LayerId, ZoneId), BTreeSet<String>>,
    neighbours: BTreeMap<PlotId, Vec<PlotId>>,
}

impl<'a> Surroundings<'a> {
    /// Collects zone programmes from `layers` (the comma separated
    /// `programme_field` attribute) and indexes `links` both ways.
    #[must_use]
    pub fn new(
        overlay: &'a PlotOverlayResult,
        themes: &'a BTreeMap<LayerId, LayerTheme>,
        layers: &[RegulationZoneLayer],
        programme_field: &str,
        links: &[(PlotId, PlotId)],
    ) -> Self {
        let programmes = layers
            .iter()
            .flat_map(|layer| {
                layer.zones.iter().filter_map(move |zone| {
                    let listed = zone.attributes.get(programme_field)?;
                    let set: BTreeSet<String> = listed
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect();
                    Some(((layer.id.clone(), zone.id.clone()), set))
                })
            })
            .collect();

        let mut neighbours: BTreeMap<PlotId, Vec<PlotId>> = BTreeMap::new();
        for (a, b) in links {
            if a != b {
                neighbours.entry(a.clone()).or_default().push(b.clone());
                neighbours.entry(b.clone()).or_default().push(a.clone());
            }
        }
        for list in neighbours.values_mut() {
            list.sort();
            list.dedup();
        }

        Self {
            overlay,
            themes,
            programmes,
            neighbours,
        }
    }

    /// Neighbours of `plot`, sorted.
    #[must_use]
    pub fn neighbours_of(&self, plot: &PlotId) -> &[PlotId] {
        self.neighbours.get(plot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Dominant zones of `plot` in layers of `theme`.
    pub fn zones_in(
        &self,
        plot: &PlotId,
        theme: LayerTheme,
    ) -> impl Iterator<Item = (&LayerId, &ZoneId)> + '_ {
        self.overlay
            .layers_for(plot)
            .into_iter()
            .flatten()
            .filter(move |(layer, _)| self.themes.get(*layer) == Some(&theme))
            .filter_map(|(layer, assignment)| match assignment {
                ZoneAssignment::Dominant { zone, .. } => Some((layer, zone)),
                ZoneAssignment::NoZone | ZoneAssignment::Unresolved { .. } => None,
            })
    }

    /// Whether `plot` has a dominant zone in a layer of `theme`.
    #[must_use]
    pub fn is_in(&self, plot: &PlotId, theme: LayerTheme) -> bool {
        self.zones_in(plot, theme).next().is_some()
    }

    /// Programmes allowed by the zones of `theme` that `plot` lies in.
    #[must_use]
    pub fn programmes_of(&self, plot: &PlotId, theme: LayerTheme) -> BTreeSet<String> {
        self.zones_in(plot, theme)
            .filter_map(|(layer, zone)| self.programmes.get(&(layer.clone(), zone.clone())))
            .flatten()
            .cloned()
            .collect()
    }
}

/// Mean master plan ratio of `neighbours`, to one decimal.
fn neighbour_ratio(neighbours: &[PlotId], plots: &BTreeMap<&PlotId, &Plot>) -> Option<f64> {
    let ratios: Vec<f64> = neighbours
        .iter()
        .filter_map(|id| plots.get(id)?.attributes.plot_ratio)
        .collect();
    if ratios.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Storey limit of the landed housing zone `plot` lies in.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn landed_storeys(
    surroundings: &Surroundings<'_>,
    plot: &PlotId,
    index: &RegulationIndex,
) -> Option<u32> {
    surroundings
        .zones_in(plot, LayerTheme::LandedHousingArea)
        .filter_map(|(layer, zone)| index.area_for(layer, zone))
        .flatten()
        .filter(|r| r.kind == ConstraintKind::StoreyLimit)
        .map(|r| r.value)
        .min_by(f64::total_cmp)
        .map(|v| v.floor().clamp(0.0, f64::from(u32::MAX)) as u32)
}

/// Derives the context ratio of every plot whose zone type has a rule, in
/// plot order. Plots no rule fires for are left out.
#[must_use]
pub fn context_gprs(
    plots: &[Plot],
    surroundings: &Surroundings<'_>,
    index: &RegulationIndex,
    settings: &ContextGprConfig,
) -> Vec<ContextGpr> {
    let by_id: BTreeMap<&PlotId, &Plot> = plots.iter().map(|p| (&p.id, p)).collect();
    let industrial: BTreeSet<&str> = settings.industrial_zones.iter().map(String::as_str).collect();

    let mut contexts = Vec::new();
    for plot in plots {
        let Some(rule) = settings.rule_for(plot.attributes.zone_type.as_deref()) else {
            continue;
        };
        let neighbours = surroundings.neighbours_of(&plot.id);
        let ratio = neighbour_ratio(neighbours, &by_id);
        let low_density = ratio.is_some_and(|r| r <= settings.threshold);
        let high_density = ratio.is_some_and(|r| r > settings.threshold);

        let industrial_neighbours = neighbours.iter().any(|id| {
            by_id
                .get(id)
                .and_then(|p| p.attributes.zone_type.as_deref())
                .is_some_and(|zone| industrial.contains(zone))
        });
        let in_landed = surroundings.is_in(&plot.id, LayerTheme::LandedHousingArea);
        let next_to_landed = neighbours
            .iter()
            .any(|id| surroundings.is_in(id, LayerTheme::LandedHousingArea));

        let context = if in_landed && low_density {
            Some((
                ContextBasis::LandedHousing,
                Some(rule.landed_gpr),
                landed_storeys(surroundings, &plot.id, index),
            ))
        } else if next_to_landed && low_density {
            Some((
                ContextBasis::LandedHousingFringe,
                Some(rule.fringe_gpr),
                Some(rule.fringe_storeys),
            ))
        } else if high_density || industrial_neighbours {
            Some((
                ContextBasis::Surroundings,
                Some(rule.context_gpr),
                Some(rule.context_storeys),
            ))
        } else if surroundings.is_in(&plot.id, LayerTheme::CentralArea) {
            Some((ContextBasis::CentralArea, None, None))
        } else {
            None
        };

        if let Some((basis, plot_ratio, storeys)) = context {
            log::debug!("{}: {basis} context, ratio {plot_ratio:?}", plot.id);
            contexts.push(ContextGpr {
                plot: plot.id.clone(),
                basis,
                plot_ratio,
                storeys,
            });
        }
    }

    log::info!("Assigned context plot ratios to {} plots", contexts.len());
    contexts
}

/// Replaces the master plan ratio of each plot in `contexts` with its
/// context ratio and adds the context storey limit.
pub fn apply_context_gprs(bundles: &mut PlotConstraintBundleSet, contexts: &[ContextGpr]) {
    let masterplan = LayerId::masterplan();

    for context in contexts {
        let Some(bundle) = bundles.get_mut(&context.plot) else {
            continue;
        };
        let zone = ZoneId::from(context.plot.as_str());

        bundle
            .area_records
            .retain(|r| !(r.layer == masterplan && r.kind == ConstraintKind::PlotRatio));
        if let Some(ratio) = context.plot_ratio {
            bundle.area_records.push(AreaRegulationRecord {
                layer: masterplan.clone(),
                zone: zone.clone(),
                kind: ConstraintKind::PlotRatio,
                value: ratio,
            });
        }
        if let Some(storeys) = context.storeys {
            bundle.area_records.push(AreaRegulationRecord {
                layer: masterplan.clone(),
                zone,
                kind: ConstraintKind::StoreyLimit,
                value: f64::from(storeys),
            });
        }
        bundle.area_records.sort_by(AreaRegulationRecord::canonical_cmp);
    }
}
