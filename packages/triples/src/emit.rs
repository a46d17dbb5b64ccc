//! Fact emission.
//!
//! Every subject is either a plot IRI or minted from the natural key of
//! the fact it describes, so the same inputs always produce the same
//! quads.

use std::collections::BTreeMap;

use plot_gfa_zoning_models::{
    AllowableGfaResult, AreaRegulationRecord, ConstraintKind, ContextGpr, LayerId, LayerTheme,
    Plot, PlotId, PlotOverlayResult, ResidentialProperties, RoadProperties, TypeRegulationRecord,
    Unit, UseType, ZoneAssignment, ZoneId,
};

use crate::quad::{QuadSet, Term, encode_segment, mint};
use crate::vocab::{OBS, OM, OPR, OZ, RDF_TYPE, class_for, predicate_for, term, unit_iri};

/// `node om:hasValue [ om:hasNumericValue value ; om:hasUnit unit ]`.
fn add_measure(set: &mut QuadSet, node: &str, unit: Unit, value: f64, graph: &str) {
    let measure = format!("{node}/measure");
    set.add(node, term(OM, "hasValue"), Term::iri(&measure), graph);
    set.add(&measure, RDF_TYPE, Term::iri(term(OM, "Measure")), graph);
    set.add(&measure, term(OM, "hasNumericValue"), Term::decimal(value), graph);
    if let Some(unit) = unit_iri(unit) {
        set.add(&measure, term(OM, "hasUnit"), Term::iri(unit), graph);
    }
}

/// Emits quads under one IRI base.
#[derive(Debug, Clone)]
pub struct Emitter {
    base: String,
}

impl Emitter {
    /// Creates an emitter; a trailing `/` is added to `base` if missing.
    #[must_use]
    pub fn new(base: &str) -> Self {
        let mut base = base.to_string();
        if !base.ends_with('/') && !base.ends_with('#') {
            base.push('/');
        }
        Self { base }
    }

    /// Graph holding regulations and their links to plots.
    #[must_use]
    pub fn regulations_graph(&self) -> String {
        format!("{}graph/planningregulations/", self.base)
    }

    /// Graph holding site areas and allowable GFAs.
    #[must_use]
    pub fn buildable_space_graph(&self) -> String {
        format!("{}graph/buildablespace/", self.base)
    }

    /// Graph holding plot-to-plot relations.
    #[must_use]
    pub fn plot_properties_graph(&self) -> String {
        format!("{}graph/plotproperties/", self.base)
    }

    /// IRI of a plot. Identifiers that already are IRIs are used as is.
    #[must_use]
    pub fn plot_iri(&self, plot: &PlotId) -> String {
        let id = plot.as_str();
        if id.starts_with("http://") || id.starts_with("https://") {
            id.to_string()
        } else {
            format!("{}plot/{}", self.base, encode_segment(id))
        }
    }

    /// IRI of a regulation zone.
    #[must_use]
    pub fn zone_iri(&self, layer: &LayerId, zone: &ZoneId) -> String {
        mint(&self.base, "zone", &[layer.as_str(), zone.as_str()])
    }

    /// IRI of the type-based regulation of a use type.
    #[must_use]
    pub fn type_regulation_iri(&self, use_type: &UseType) -> String {
        mint(&self.base, "typeregulation", &[use_type.as_str()])
    }

    /// Zones with their area-based constraints.
    #[must_use]
    pub fn area_regulations(
        &self,
        records: &[AreaRegulationRecord],
        themes: &BTreeMap<LayerId, LayerTheme>,
    ) -> QuadSet {
        let graph = self.regulations_graph();
        let mut set = QuadSet::new();

        for record in records {
            let zone = self.zone_iri(&record.layer, &record.zone);
            let theme = themes
                .get(&record.layer)
                .copied()
                .unwrap_or(LayerTheme::Other);
            set.add(&zone, RDF_TYPE, Term::iri(term(OPR, theme.class_name())), &graph);
            set.add(
                &zone,
                term(OPR, "hasZoneIdentifier"),
                Term::string(record.zone.as_str()),
                &graph,
            );

            let value = record.value.to_string();
            let node = mint(
                &self.base,
                "constraint",
                &[record.layer.as_str(), record.zone.as_str(), record.kind.as_ref(), value.as_str()],
            );
            set.add(&zone, predicate_for(record.kind), Term::iri(&node), &graph);
            set.add(&node, RDF_TYPE, Term::iri(class_for(record.kind)), &graph);
            add_measure(&mut set, &node, record.kind.unit(), record.value, &graph);
        }

        log::info!("Emitted {} quads for {} area records", set.len(), records.len());
        set
    }

    /// Type-based regulations with their per-storey allocations.
    #[must_use]
    pub fn type_regulations(&self, records: &[TypeRegulationRecord]) -> QuadSet {
        let graph = self.regulations_graph();
        let mut set = QuadSet::new();

        for record in records {
            let regulation = self.type_regulation_iri(&record.use_type);
            set.add(
                &regulation,
                RDF_TYPE,
                Term::iri(term(OPR, "TypeBasedRegulation")),
                &graph,
            );
            set.add(
                &regulation,
                term(OPR, "forProgramme"),
                Term::iri(term(OZ, &encode_segment(record.use_type.as_str()))),
                &graph,
            );

            let storey = record.storey.to_string();
            let value = record.value.to_string();
            let open = record.open_ended.to_string();
            let node = mint(
                &self.base,
                "storeyallocation",
                &[
                    record.use_type.as_str(),
                    storey.as_str(),
                    record.kind.as_ref(),
                    open.as_str(),
                    value.as_str(),
                ],
            );
            set.add(&regulation, predicate_for(record.kind), Term::iri(&node), &graph);
            set.add(&node, RDF_TYPE, Term::iri(class_for(record.kind)), &graph);
            set.add(&node, term(OPR, "atStorey"), Term::integer(record.storey), &graph);
            if record.open_ended {
                set.add(&node, term(OPR, "appliesToHigherStoreys"), Term::boolean(true), &graph);
            }
            add_measure(&mut set, &node, record.kind.unit(), record.value, &graph);
        }

        log::info!("Emitted {} quads for {} type records", set.len(), records.len());
        set
    }

    /// `zone appliesTo plot` for every dominant zone.
    #[must_use]
    pub fn overlay_links(&self, overlay: &PlotOverlayResult) -> QuadSet {
        let graph = self.regulations_graph();
        let mut set = QuadSet::new();

        for (plot, layers) in overlay.iter() {
            let plot_iri = self.plot_iri(plot);
            for (layer, assignment) in layers {
                if let ZoneAssignment::Dominant { zone, .. } = assignment {
                    set.add(
                        self.zone_iri(layer, zone),
                        term(OPR, "appliesTo"),
                        Term::iri(&plot_iri),
                        &graph,
                    );
                }
            }
        }

        set
    }

    /// `type regulation appliesTo plot` for plots whose use type, or one of
    /// their `allowed` residential programmes, has one. `regulated` must be
    /// sorted.
    #[must_use]
    pub fn type_links(
        &self,
        plots: &[Plot],
        regulated: &[UseType],
        allowed: &BTreeMap<PlotId, Vec<UseType>>,
    ) -> QuadSet {
        let graph = self.regulations_graph();
        let mut set = QuadSet::new();

        for plot in plots {
            let plot_iri = self.plot_iri(&plot.id);
            let candidates = plot
                .attributes
                .use_type
                .iter()
                .chain(allowed.get(&plot.id).into_iter().flatten());
            for use_type in candidates {
                if regulated.binary_search(use_type).is_ok() {
                    set.add(
                        self.type_regulation_iri(use_type),
                        term(OPR, "appliesTo"),
                        Term::iri(&plot_iri),
                        &graph,
                    );
                }
            }
        }

        set
    }

    /// Fringe and corner flags with median width and depth of residential
    /// plots. Non-finite measurements are left out.
    #[must_use]
    pub fn residential_properties(&self, properties: &[ResidentialProperties]) -> QuadSet {
        let graph = self.plot_properties_graph();
        let mut set = QuadSet::new();

        for props in properties {
            let plot_iri = self.plot_iri(&props.plot);
            set.add(
                &plot_iri,
                term(OBS, "isAtResidentialFringe"),
                Term::boolean(props.fringe),
                &graph,
            );
            if let Some(corner) = props.corner {
                set.add(&plot_iri, term(OBS, "isCornerPlot"), Term::boolean(corner), &graph);
            }

            let spans = [
                ("hasWidth", "AverageWidth", "width", props.average_width),
                ("hasDepth", "AverageDepth", "depth", props.average_depth),
            ];
            for (predicate, class, key, value) in spans {
                let Some(value) = value.filter(|v| v.is_finite()) else {
                    continue;
                };
                let node = mint(&self.base, key, &[props.plot.as_str()]);
                set.add(&plot_iri, term(OBS, predicate), Term::iri(&node), &graph);
                set.add(&node, RDF_TYPE, Term::iri(term(OBS, class)), &graph);
                add_measure(&mut set, &node, Unit::Metre, value, &graph);
            }
        }

        log::info!(
            "Emitted {} quads for {} residential plots",
            set.len(),
            properties.len()
        );
        set
    }

    /// Road type and category of road plots.
    #[must_use]
    pub fn road_properties(&self, properties: &[RoadProperties]) -> QuadSet {
        let graph = self.plot_properties_graph();
        let mut set = QuadSet::new();

        for props in properties {
            let plot_iri = self.plot_iri(&props.plot);
            if let Some(road_type) = &props.road_type {
                set.add(&plot_iri, term(OBS, "hasRoadType"), Term::string(road_type), &graph);
            }
            set.add(
                &plot_iri,
                term(OBS, "hasRoadCategory"),
                Term::string(props.category.as_ref()),
                &graph,
            );
        }

        set
    }

    /// Plot ratios and storey counts assigned from the plots' surroundings.
    #[must_use]
    pub fn context_gprs(&self, contexts: &[ContextGpr]) -> QuadSet {
        let graph = self.regulations_graph();
        let mut set = QuadSet::new();

        for context in contexts {
            let plot_iri = self.plot_iri(&context.plot);
            set.add(
                &plot_iri,
                term(OBS, "hasContextBasis"),
                Term::string(context.basis.as_ref()),
                &graph,
            );

            let ratio = context.plot_ratio.filter(|r| r.is_finite());
            let storeys = context.storeys.map(f64::from);
            let values = [
                (ConstraintKind::PlotRatio, ratio),
                (ConstraintKind::StoreyLimit, storeys),
            ];
            for (kind, value) in values {
                let Some(value) = value else {
                    continue;
                };
                let node = mint(
                    &self.base,
                    "contextconstraint",
                    &[context.plot.as_str(), kind.as_ref()],
                );
                set.add(&plot_iri, predicate_for(kind), Term::iri(&node), &graph);
                set.add(&node, RDF_TYPE, Term::iri(class_for(kind)), &graph);
                add_measure(&mut set, &node, kind.unit(), value, &graph);
            }
        }

        log::info!("Emitted {} quads for {} context ratios", set.len(), contexts.len());
        set
    }

    /// Site area of each plot. Plots whose area is not a finite number
    /// get no site area.
    #[must_use]
    pub fn site_areas(&self, plots: &[Plot]) -> QuadSet {
        let graph = self.buildable_space_graph();
        let mut set = QuadSet::new();

        for plot in plots {
            if !plot.attributes.gross_area.is_finite() {
                log::warn!(
                    "Skipping site area of plot {}: area is {}",
                    plot.id,
                    plot.attributes.gross_area
                );
                continue;
            }
            let plot_iri = self.plot_iri(&plot.id);
            let node = mint(&self.base, "sitearea", &[plot.id.as_str()]);
            set.add(&plot_iri, term(OBS, "hasSiteArea"), Term::iri(&node), &graph);
            set.add(&node, RDF_TYPE, Term::iri(term(OBS, "SiteArea")), &graph);
            add_measure(
                &mut set,
                &node,
                Unit::SquareMetre,
                plot.attributes.gross_area,
                &graph,
            );
        }

        set
    }

    /// Symmetric `hasNeighbour` links.
    #[must_use]
    pub fn neighbours(&self, links: &[(PlotId, PlotId)]) -> QuadSet {
        let graph = self.plot_properties_graph();
        let predicate = term(OBS, "hasNeighbour");
        let mut set = QuadSet::new();

        for (a, b) in links {
            if a == b {
                continue;
            }
            let (a, b) = (self.plot_iri(a), self.plot_iri(b));
            set.add(&a, &predicate, Term::iri(&b), &graph);
            set.add(&b, &predicate, Term::iri(&a), &graph);
        }

        set
    }

    /// Allowable GFA of each plot. `scenario` names an alternate run; its
    /// buildable spaces are distinct from the baseline's.
    #[must_use]
    pub fn gfa_results(&self, results: &[AllowableGfaResult], scenario: Option<&str>) -> QuadSet {
        let graph = self.buildable_space_graph();
        let mut set = QuadSet::new();
        let run = scenario.unwrap_or("baseline");

        for result in results {
            let plot_iri = self.plot_iri(&result.plot);
            let space = mint(&self.base, "buildablespace", &[result.plot.as_str(), run]);

            set.add(&plot_iri, term(OBS, "hasBuildableSpace"), Term::iri(&space), &graph);
            set.add(&space, RDF_TYPE, Term::iri(term(OBS, "BuildableSpace")), &graph);
            set.add(
                &space,
                term(OBS, "hasGFAStatus"),
                Term::string(result.status.as_ref()),
                &graph,
            );
            if let Some(name) = scenario {
                set.add(&space, term(OBS, "forScenario"), Term::string(name), &graph);
            }
            for kind in &result.contributing {
                set.add(
                    &space,
                    term(OBS, "constrainedBy"),
                    Term::iri(class_for(*kind)),
                    &graph,
                );
            }

            if let Some(gfa) = result.allowable_gfa.filter(|gfa| gfa.is_finite()) {
                let node = format!("{space}/gfa");
                set.add(&space, term(OBS, "hasAllowedGFA"), Term::iri(&node), &graph);
                set.add(&node, RDF_TYPE, Term::iri(term(OBS, "GrossFloorArea")), &graph);
                add_measure(&mut set, &node, Unit::SquareMetre, gfa, &graph);
            }
        }

        log::info!("Emitted {} quads for {} GFA results", set.len(), results.len());
        set
    }
}

#[cfg(test)]
mod tests {
    use plot_gfa_zoning_models::{ContextBasis, GfaStatus, PlotAttributes, RoadCategory};

    use super::*;

    fn emitter() -> Emitter {
        Emitter::new("https://ex.org/kg")
    }

    fn record(zone: &str, value: f64) -> AreaRegulationRecord {
        AreaRegulationRecord {
            layer: "height".into(),
            zone: zone.into(),
            kind: ConstraintKind::StoreyLimit,
            value,
        }
    }

    #[test]
    fn plot_iris_keep_existing_iris() {
        let e = emitter();
        assert_eq!(
            e.plot_iri(&"https://city.org/plot/1".into()),
            "https://city.org/plot/1"
        );
        assert_eq!(e.plot_iri(&"P 1".into()), "https://ex.org/kg/plot/P%201");
    }

    #[test]
    fn area_emission_is_stable() {
        let mut themes = BTreeMap::new();
        themes.insert(LayerId::from("height"), LayerTheme::HeightControl);
        let records = vec![record("z1", 12.0), record("z2", 5.0)];

        let first = emitter().area_regulations(&records, &themes);
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        let second = emitter().area_regulations(&reversed, &themes);

        assert_eq!(first.to_nquads(), second.to_nquads());
        assert!(first.to_nquads().contains("HeightControlPlan"));
        assert!(first.to_nquads().contains("\"12\"^^<http://www.w3.org/2001/XMLSchema#decimal>"));
    }

    #[test]
    fn neighbours_are_symmetric_without_self_links() {
        let links = vec![
            (PlotId::from("a"), PlotId::from("b")),
            (PlotId::from("c"), PlotId::from("c")),
        ];
        let set = emitter().neighbours(&links);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn missing_gfa_has_no_measure() {
        let results = vec![AllowableGfaResult {
            plot: "p1".into(),
            allowable_gfa: None,
            area_candidate: None,
            type_candidate: None,
            permitted_storeys: None,
            contributing: vec![],
            status: GfaStatus::MissingData,
        }];
        let doc = emitter().gfa_results(&results, None).to_nquads();
        assert!(doc.contains("missing_data"));
        assert!(!doc.contains("hasAllowedGFA"));

        let scenario = emitter().gfa_results(&results, Some("height_relaxed")).to_nquads();
        assert_ne!(doc, scenario);
        assert!(scenario.contains("forScenario"));
    }

    fn plot(id: &str, gross_area: f64, use_type: Option<&str>) -> Plot {
        Plot {
            id: id.into(),
            geometry: geo::MultiPolygon::new(vec![]),
            attributes: PlotAttributes {
                gross_area,
                use_type: use_type.map(UseType::new),
                ..PlotAttributes::default()
            },
        }
    }

    #[test]
    fn non_finite_site_areas_are_skipped() {
        let plots = vec![
            plot("p1", 120.0, None),
            plot("p2", f64::NAN, None),
            plot("p3", f64::INFINITY, None),
        ];
        let doc = emitter().site_areas(&plots).to_nquads();
        assert_eq!(doc.matches("hasSiteArea").count(), 1);
        assert!(doc.contains("plot/p1"));
        assert!(!doc.contains("NaN"));
        assert!(!doc.contains("inf"));
    }

    #[test]
    fn non_finite_gfa_has_no_measure() {
        let result = |gfa: f64| AllowableGfaResult {
            plot: "p1".into(),
            allowable_gfa: Some(gfa),
            area_candidate: Some(gfa),
            type_candidate: None,
            permitted_storeys: None,
            contributing: vec![ConstraintKind::PlotRatio],
            status: GfaStatus::Ok,
        };
        for gfa in [f64::NAN, f64::INFINITY] {
            let doc = emitter().gfa_results(&[result(gfa)], None).to_nquads();
            assert!(doc.contains("hasBuildableSpace"));
            assert!(!doc.contains("hasAllowedGFA"));
        }
        let doc = emitter().gfa_results(&[result(250.0)], None).to_nquads();
        assert!(doc.contains("hasAllowedGFA"));
    }

    #[test]
    fn allowed_programmes_widen_type_links() {
        let regulated = vec![UseType::new("Bungalow"), UseType::new("Flat")];
        let plots = vec![plot("p1", 500.0, Some("Flat")), plot("p2", 500.0, None)];
        let mut allowed = BTreeMap::new();
        allowed.insert(
            PlotId::from("p2"),
            vec![UseType::new("Bungalow"), UseType::new("Condominium")],
        );

        let set = emitter().type_links(&plots, &regulated, &allowed);
        let doc = set.to_nquads();
        assert_eq!(set.len(), 2);
        assert!(doc.contains("typeregulation/Flat"));
        assert!(doc.contains("typeregulation/Bungalow"));
        assert!(!doc.contains("Condominium"));
    }

    #[test]
    fn residential_properties_leave_out_unknown_measurements() {
        let properties = vec![
            ResidentialProperties {
                plot: "p1".into(),
                fringe: true,
                corner: Some(false),
                average_width: Some(12.5),
                average_depth: Some(f64::NAN),
            },
            ResidentialProperties {
                plot: "p2".into(),
                fringe: false,
                corner: None,
                average_width: None,
                average_depth: None,
            },
        ];
        let doc = emitter().residential_properties(&properties).to_nquads();
        assert_eq!(doc.matches("isAtResidentialFringe").count(), 2);
        assert_eq!(doc.matches("isCornerPlot").count(), 1);
        assert!(doc.contains("AverageWidth"));
        assert!(!doc.contains("AverageDepth"));
        assert!(doc.contains("\"12.5\"^^<http://www.w3.org/2001/XMLSchema#decimal>"));
    }

    #[test]
    fn road_plots_carry_type_and_category() {
        let properties = vec![
            RoadProperties {
                plot: "r1".into(),
                road_type: Some("Expressway".to_string()),
                category: RoadCategory::Category1,
            },
            RoadProperties {
                plot: "r2".into(),
                road_type: None,
                category: RoadCategory::Unknown,
            },
        ];
        let doc = emitter().road_properties(&properties).to_nquads();
        assert_eq!(doc.matches("hasRoadType").count(), 1);
        assert!(doc.contains("\"1\""));
        assert!(doc.contains("\"unknown\""));
    }

    #[test]
    fn cleared_context_ratio_emits_only_the_basis() {
        let contexts = vec![
            ContextGpr {
                plot: "p1".into(),
                basis: ContextBasis::LandedHousing,
                plot_ratio: Some(1.4),
                storeys: Some(4),
            },
            ContextGpr {
                plot: "p2".into(),
                basis: ContextBasis::CentralArea,
                plot_ratio: None,
                storeys: None,
            },
        ];
        let doc = emitter().context_gprs(&contexts).to_nquads();
        assert!(doc.contains("landed_housing"));
        assert!(doc.contains("central_area"));
        assert_eq!(doc.matches("allowsGrossPlotRatio").count(), 1);
        assert_eq!(doc.matches("allowsStoreyAggregate").count(), 1);
    }
}
