//! Plot-to-regulation linking.
//!
//! Joins each plot's per-layer dominant zone against area records keyed by
//! `(layer, zone)` and its use type against type records keyed by use
//! type. Joins are `BTreeMap` lookups, so bundles come out in the same
//! order with the same contents on every run.

use std::collections::BTreeMap;

use plot_gfa_zoning_models::{
    AreaRegulationRecord, ConstraintKind, IssueKind, LayerId, Plot, PlotConstraintBundle,
    PlotConstraintBundleSet, PlotOverlayResult, QualityReport, Stage, TypeRegulationRecord,
    UseType, ZoneAssignment, ZoneId,
};

/// Regulation records indexed by their join keys.
#[derive(Debug, Clone, Default)]
pub struct RegulationIndex {
    area: BTreeMap<(LayerId, ZoneId), Vec<AreaRegulationRecord>>,
    types: BTreeMap<UseType, Vec<TypeRegulationRecord>>,
}

impl RegulationIndex {
    /// Indexes normalized records.
    #[must_use]
    pub fn new(
        area_records: &[AreaRegulationRecord],
        type_records: &[TypeRegulationRecord],
    ) -> Self {
        let mut area: BTreeMap<(LayerId, ZoneId), Vec<AreaRegulationRecord>> = BTreeMap::new();
        for record in area_records {
            area.entry((record.layer.clone(), record.zone.clone()))
                .or_default()
                .push(record.clone());
        }

        let mut types: BTreeMap<UseType, Vec<TypeRegulationRecord>> = BTreeMap::new();
        for record in type_records {
            types
                .entry(record.use_type.clone())
                .or_default()
                .push(record.clone());
        }

        Self { area, types }
    }

    /// Area records of one zone of one layer.
    #[must_use]
    pub fn area_for(&self, layer: &LayerId, zone: &ZoneId) -> Option<&[AreaRegulationRecord]> {
        self.area
            .get(&(layer.clone(), zone.clone()))
            .map(Vec::as_slice)
    }

    /// Type records of one use type.
    #[must_use]
    pub fn types_for(&self, use_type: &UseType) -> Option<&[TypeRegulationRecord]> {
        self.types.get(use_type).map(Vec::as_slice)
    }

    /// Layers that have at least one area record.
    pub fn layers(&self) -> impl Iterator<Item = &LayerId> {
        let mut seen: Vec<&LayerId> = self.area.keys().map(|(layer, _)| layer).collect();
        seen.dedup();
        seen.into_iter()
    }
}

/// Builds the constraint bundle of every plot.
///
/// Every plot in `plots` gets a bundle, including plots with no constraint
/// at all. Join misses are listed on the bundle's `absent_layers` and
/// recorded in `report`; overlay failures are listed on
/// `unresolved_layers`.
#[must_use]
pub fn link(
    overlay: &PlotOverlayResult,
    plots: &[Plot],
    index: &RegulationIndex,
    report: &mut QualityReport,
) -> PlotConstraintBundleSet {
    let bundles: Vec<PlotConstraintBundle> = plots
        .iter()
        .map(|plot| link_plot(overlay, plot, index, report))
        .collect();
    let joined = bundles.iter().filter(|b| !b.is_empty()).count();
    let set = PlotConstraintBundleSet::from_bundles(bundles);

    log::info!("Linked regulations to {joined} of {} plots", set.len());

    set
}

fn link_plot(
    overlay: &PlotOverlayResult,
    plot: &Plot,
    index: &RegulationIndex,
    report: &mut QualityReport,
) -> PlotConstraintBundle {
    let mut area_records = Vec::new();
    let mut absent_layers = Vec::new();
    let mut unresolved_layers = Vec::new();

    if let Some(layers) = overlay.layers_for(&plot.id) {
        for (layer, assignment) in layers {
            match assignment {
                ZoneAssignment::Dominant { zone, .. } => match index.area_for(layer, zone) {
                    Some(records) => area_records.extend_from_slice(records),
                    None => {
                        absent_layers.push(layer.clone());
                        report.record(
                            plot.id.as_str(),
                            Stage::Link,
                            IssueKind::JoinMiss,
                            format!("zone '{zone}' of layer '{layer}' has no regulation"),
                        );
                    }
                },
                ZoneAssignment::NoZone => {}
                ZoneAssignment::Unresolved { .. } => unresolved_layers.push(layer.clone()),
            }
        }
    }

    if let Some(ratio) = plot.attributes.plot_ratio {
        if ratio.is_finite() && ratio >= 0.0 {
            area_records.push(AreaRegulationRecord {
                layer: LayerId::masterplan(),
                zone: ZoneId::from(plot.id.as_str()),
                kind: ConstraintKind::PlotRatio,
                value: ratio,
            });
        } else {
            report.record(
                plot.id.as_str(),
                Stage::Link,
                IssueKind::DataQuality,
                format!("plot ratio {ratio} ignored"),
            );
        }
    }

    let mut type_records = Vec::new();
    if let Some(use_type) = &plot.attributes.use_type {
        match index.types_for(use_type) {
            Some(records) => type_records.extend_from_slice(records),
            None => report.record(
                plot.id.as_str(),
                Stage::Link,
                IssueKind::JoinMiss,
                format!("use type '{use_type}' has no type regulation"),
            ),
        }
    }

    area_records.sort_by(AreaRegulationRecord::canonical_cmp);
    area_records.dedup();
    type_records.sort_by(TypeRegulationRecord::canonical_cmp);
    type_records.dedup();

    PlotConstraintBundle {
        plot: plot.id.clone(),
        zone_type: plot.attributes.zone_type.clone(),
        use_type: plot.attributes.use_type.clone(),
        site_area: plot.attributes.gross_area,
        area_records,
        type_records,
        absent_layers,
        unresolved_layers,
    }
}

#[cfg(test)]
mod tests {
    use geo::MultiPolygon;
    use plot_gfa_zoning_models::{PlotAttributes, PlotId};

    use super::*;

    fn plot(id: &str, use_type: Option<&str>, plot_ratio: Option<f64>) -> Plot {
        Plot {
            id: id.into(),
            geometry: MultiPolygon::new(vec![]),
            attributes: PlotAttributes {
                zone_type: Some("RESIDENTIAL".to_string()),
                use_type: use_type.map(UseType::from),
                plot_ratio,
                gross_area: 1000.0,
            },
        }
    }

    fn dominant(zone: &str) -> ZoneAssignment {
        ZoneAssignment::Dominant {
            zone: zone.into(),
            overlap_area: 1000.0,
            overlap_ratio: 1.0,
        }
    }

    fn overlay() -> PlotOverlayResult {
        let mut p1 = BTreeMap::new();
        p1.insert(LayerId::from("height"), dominant("h1"));
        p1.insert(LayerId::from("central"), dominant("c-unknown"));
        let mut p2 = BTreeMap::new();
        p2.insert(LayerId::from("height"), ZoneAssignment::NoZone);
        p2.insert(
            LayerId::from("central"),
            ZoneAssignment::Unresolved {
                reason: "zero area".to_string(),
            },
        );
        let mut plots = BTreeMap::new();
        plots.insert(PlotId::from("p1"), p1);
        plots.insert(PlotId::from("p2"), p2);
        PlotOverlayResult::new(plots)
    }

    fn index() -> RegulationIndex {
        let area = vec![
            AreaRegulationRecord {
                layer: "height".into(),
                zone: "h1".into(),
                kind: ConstraintKind::StoreyLimit,
                value: 12.0,
            },
            AreaRegulationRecord {
                layer: "height".into(),
                zone: "h2".into(),
                kind: ConstraintKind::StoreyLimit,
                value: 4.0,
            },
        ];
        let types = vec![TypeRegulationRecord {
            use_type: "Flat".into(),
            storey: 1,
            kind: ConstraintKind::StoreyFloorArea,
            value: 400.0,
            open_ended: true,
        }];
        RegulationIndex::new(&area, &types)
    }

    #[test]
    fn joins_zones_use_types_and_plot_ratio() {
        let plots = vec![plot("p1", Some("Flat"), Some(2.8))];
        let mut report = QualityReport::new();
        let set = link(&overlay(), &plots, &index(), &mut report);

        let bundle = set.get(&"p1".into()).unwrap();
        assert_eq!(bundle.area_records.len(), 2);
        assert_eq!(bundle.area_records[0].layer.as_str(), "height");
        assert_eq!(bundle.area_records[1].layer, LayerId::masterplan());
        assert_eq!(bundle.type_records.len(), 1);
        assert_eq!(bundle.absent_layers, vec![LayerId::from("central")]);
        assert!(bundle.unresolved_layers.is_empty());
        assert_eq!(report.count(IssueKind::JoinMiss), 1);
    }

    #[test]
    fn unresolved_and_empty_plots_get_bundles() {
        let plots = vec![plot("p2", Some("Shophouse"), None)];
        let mut report = QualityReport::new();
        let set = link(&overlay(), &plots, &index(), &mut report);

        let bundle = set.get(&"p2".into()).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.unresolved_layers, vec![LayerId::from("central")]);
        assert!(bundle.absent_layers.is_empty());
        assert_eq!(report.count(IssueKind::JoinMiss), 1);
    }

    #[test]
    fn linking_is_idempotent() {
        let plots = vec![
            plot("p2", None, Some(1.4)),
            plot("p1", Some("Flat"), Some(2.8)),
        ];
        let first = link(&overlay(), &plots, &index(), &mut QualityReport::new());
        let second = link(&overlay(), &plots, &index(), &mut QualityReport::new());
        assert_eq!(first, second);
        let order: Vec<&str> = first.iter().map(|b| b.plot.as_str()).collect();
        assert_eq!(order, vec!["p1", "p2"]);
    }
}
