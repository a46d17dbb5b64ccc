//! Regulation, GFA and scenario summary tables.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use plot_gfa_zoning_models::{
    AllowableGfaResult, AreaRegulationRecord, MASTERPLAN_LAYER, Plot, PlotId, PlotOverlayResult,
    RegulationZoneLayer, ZoneAssignment,
};
use serde::Serialize;

/// Gains at or below this many square metres are not counted as affected.
pub const AFFECTED_GAIN_THRESHOLD: f64 = 10.0;

const NO_ZONE_TYPE: &str = "(none)";

/// One row of `regulation_overview.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegulationOverviewRow {
    pub layer: String,
    pub theme: String,
    pub zones: usize,
    pub regulation_records: usize,
    /// Plots with a dominant zone in the layer.
    pub linked_plots: usize,
    /// Total area of the linked plots in km².
    pub linked_area_km2: f64,
    pub generated_at: String,
}

/// One row of `gfa_overview.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GfaOverviewRow {
    /// `all`, `status` or `zone_type`.
    pub group: String,
    pub key: String,
    pub plots: usize,
    pub with_plot_ratio: usize,
    pub with_gfa: usize,
    pub total_gfa: f64,
    pub generated_at: String,
}

/// One row of `scenario_difference.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioMetricRow {
    pub metric: String,
    pub value: f64,
    pub generated_at: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Per-layer zone, record and linked-plot counts, preceded by a
/// master-plan row covering every plot.
#[must_use]
pub fn regulation_overview(
    plots: &[Plot],
    layers: &[RegulationZoneLayer],
    records: &[AreaRegulationRecord],
    overlay: &PlotOverlayResult,
    generated_at: DateTime<Utc>,
) -> Vec<RegulationOverviewRow> {
    let at = timestamp(generated_at);
    let area_of: BTreeMap<&PlotId, f64> = plots
        .iter()
        .map(|p| (&p.id, p.attributes.gross_area))
        .collect();

    let zone_types: BTreeSet<&str> = plots
        .iter()
        .filter_map(|p| p.attributes.zone_type.as_deref())
        .collect();

    let mut rows = vec![RegulationOverviewRow {
        layer: MASTERPLAN_LAYER.to_string(),
        theme: MASTERPLAN_LAYER.to_string(),
        zones: zone_types.len(),
        regulation_records: plots
            .iter()
            .filter(|p| p.attributes.plot_ratio.is_some())
            .count(),
        linked_plots: plots.len(),
        linked_area_km2: round_to(area_of.values().sum::<f64>() / 1e6, 3),
        generated_at: at.clone(),
    }];

    for layer in layers {
        let linked: Vec<&PlotId> = overlay
            .iter()
            .filter(|(_, by_layer)| {
                by_layer
                    .get(&layer.id)
                    .is_some_and(|a| matches!(a, ZoneAssignment::Dominant { .. }))
            })
            .map(|(plot, _)| plot)
            .collect();
        let linked_area: f64 = linked.iter().filter_map(|p| area_of.get(p)).sum();

        rows.push(RegulationOverviewRow {
            layer: layer.id.to_string(),
            theme: layer.theme.to_string(),
            zones: layer.zones.len(),
            regulation_records: records.iter().filter(|r| r.layer == layer.id).count(),
            linked_plots: linked.len(),
            linked_area_km2: round_to(linked_area / 1e6, 3),
            generated_at: at.clone(),
        });
    }

    log::info!("Regulation overview: {} rows", rows.len());
    rows
}

#[derive(Default)]
struct Tally {
    plots: usize,
    with_plot_ratio: usize,
    with_gfa: usize,
    total_gfa: f64,
}

impl Tally {
    fn add(&mut self, result: &AllowableGfaResult, has_plot_ratio: bool) {
        self.plots += 1;
        if has_plot_ratio {
            self.with_plot_ratio += 1;
        }
        if let Some(gfa) = result.allowable_gfa {
            self.with_gfa += 1;
            self.total_gfa += gfa;
        }
    }

    fn into_row(self, group: &str, key: &str, at: &str) -> GfaOverviewRow {
        GfaOverviewRow {
            group: group.to_string(),
            key: key.to_string(),
            plots: self.plots,
            with_plot_ratio: self.with_plot_ratio,
            with_gfa: self.with_gfa,
            total_gfa: round_to(self.total_gfa, 2),
            generated_at: at.to_string(),
        }
    }
}

/// Plot counts and total allowable GFA overall, per status and per master
/// plan zone type.
#[must_use]
pub fn gfa_overview(
    plots: &[Plot],
    results: &[AllowableGfaResult],
    generated_at: DateTime<Utc>,
) -> Vec<GfaOverviewRow> {
    let at = timestamp(generated_at);
    let by_id: BTreeMap<&PlotId, &Plot> = plots.iter().map(|p| (&p.id, p)).collect();

    let mut all = Tally::default();
    let mut by_status: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_zone: BTreeMap<String, Tally> = BTreeMap::new();

    for result in results {
        let plot = by_id.get(&result.plot);
        let has_plot_ratio = plot.is_some_and(|p| p.attributes.plot_ratio.is_some());
        let zone_type = plot
            .and_then(|p| p.attributes.zone_type.clone())
            .unwrap_or_else(|| NO_ZONE_TYPE.to_string());

        all.add(result, has_plot_ratio);
        by_status
            .entry(result.status.to_string())
            .or_default()
            .add(result, has_plot_ratio);
        by_zone.entry(zone_type).or_default().add(result, has_plot_ratio);
    }

    let mut rows = vec![all.into_row("all", "all", &at)];
    rows.extend(
        by_status
            .into_iter()
            .map(|(key, tally)| tally.into_row("status", &key, &at)),
    );
    rows.extend(
        by_zone
            .into_iter()
            .map(|(key, tally)| tally.into_row("zone_type", &key, &at)),
    );
    rows
}

/// GFA gain of the scenario over the baseline.
///
/// Only plots in `scope` (all plots when `None`) with an allowable GFA in
/// both runs are compared. A plot is affected when its gain exceeds
/// [`AFFECTED_GAIN_THRESHOLD`]; totals and averages are over affected
/// plots. Status changes are counted over every plot in scope.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scenario_difference(
    baseline: &[AllowableGfaResult],
    scenario: &[AllowableGfaResult],
    plots: &[Plot],
    scope: Option<&BTreeSet<PlotId>>,
    generated_at: DateTime<Utc>,
) -> Vec<ScenarioMetricRow> {
    let at = timestamp(generated_at);
    let in_scope = |plot: &PlotId| scope.is_none_or(|s| s.contains(plot));
    let area_of: BTreeMap<&PlotId, f64> = plots
        .iter()
        .map(|p| (&p.id, p.attributes.gross_area))
        .collect();
    let scenario_by_id: BTreeMap<&PlotId, &AllowableGfaResult> =
        scenario.iter().map(|r| (&r.plot, r)).collect();

    let mut affected = 0usize;
    let mut total_gain = 0.0;
    let mut affected_area = 0.0;
    let mut status_changes = 0usize;

    for base in baseline.iter().filter(|r| in_scope(&r.plot)) {
        let Some(alt) = scenario_by_id.get(&base.plot) else {
            continue;
        };
        if alt.status != base.status {
            status_changes += 1;
        }
        if let (Some(before), Some(after)) = (base.allowable_gfa, alt.allowable_gfa) {
            let gain = after - before;
            if gain > AFFECTED_GAIN_THRESHOLD {
                affected += 1;
                total_gain += gain;
                affected_area += area_of.get(&base.plot).copied().unwrap_or(0.0);
            }
        }
    }

    let (average_gain, average_area) = if affected == 0 {
        (0.0, 0.0)
    } else {
        (
            round_to(total_gain / affected as f64, 2),
            round_to(affected_area / affected as f64, 2),
        )
    };

    log::info!("Scenario: {affected} affected plots, total gain {total_gain:.2} m²");

    [
        ("total_gfa_gain_m2", round_to(total_gain, 2)),
        ("affected_plots", affected as f64),
        ("average_gain_per_affected_plot_m2", average_gain),
        ("average_affected_plot_area_m2", average_area),
        ("status_changes", status_changes as f64),
    ]
    .into_iter()
    .map(|(metric, value)| ScenarioMetricRow {
        metric: metric.to_string(),
        value,
        generated_at: at.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use geo::{MultiPolygon, polygon};
    use plot_gfa_zoning_models::{
        ConstraintKind, GfaStatus, LayerId, LayerTheme, PlotAttributes, ZonePolygon,
    };

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    fn plot(id: &str, zone: Option<&str>, ratio: Option<f64>, area: f64) -> Plot {
        Plot {
            id: id.into(),
            geometry: square(),
            attributes: PlotAttributes {
                zone_type: zone.map(str::to_string),
                use_type: None,
                plot_ratio: ratio,
                gross_area: area,
            },
        }
    }

    fn result(id: &str, gfa: Option<f64>, status: GfaStatus) -> AllowableGfaResult {
        AllowableGfaResult {
            plot: id.into(),
            allowable_gfa: gfa,
            area_candidate: gfa,
            type_candidate: None,
            permitted_storeys: None,
            contributing: vec![ConstraintKind::PlotRatio],
            status,
        }
    }

    #[test]
    fn regulation_overview_counts_layers() {
        let plots = vec![
            plot("p1", Some("RESIDENTIAL"), Some(2.8), 500_000.0),
            plot("p2", Some("COMMERCIAL"), None, 250_000.0),
        ];
        let layer = RegulationZoneLayer::new(
            "height",
            LayerTheme::HeightControl,
            vec![ZonePolygon {
                id: "h1".into(),
                geometry: square(),
                attributes: BTreeMap::new(),
            }],
        );
        let records = vec![AreaRegulationRecord {
            layer: "height".into(),
            zone: "h1".into(),
            kind: ConstraintKind::StoreyLimit,
            value: 12.0,
        }];

        let mut by_layer = BTreeMap::new();
        by_layer.insert(
            LayerId::from("height"),
            ZoneAssignment::Dominant {
                zone: "h1".into(),
                overlap_area: 100.0,
                overlap_ratio: 1.0,
            },
        );
        let mut assignments = BTreeMap::new();
        assignments.insert(PlotId::from("p1"), by_layer);
        let mut p2_layers = BTreeMap::new();
        p2_layers.insert(LayerId::from("height"), ZoneAssignment::NoZone);
        assignments.insert(PlotId::from("p2"), p2_layers);
        let overlay = PlotOverlayResult::new(assignments);

        let rows = regulation_overview(&plots, &[layer], &records, &overlay, at());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].layer, "masterplan");
        assert_eq!(rows[0].zones, 2);
        assert_eq!(rows[0].regulation_records, 1);
        assert_eq!(rows[0].linked_plots, 2);
        assert!((rows[0].linked_area_km2 - 0.75).abs() < 1e-9);

        assert_eq!(rows[1].layer, "height");
        assert_eq!(rows[1].zones, 1);
        assert_eq!(rows[1].regulation_records, 1);
        assert_eq!(rows[1].linked_plots, 1);
        assert!((rows[1].linked_area_km2 - 0.5).abs() < 1e-9);
        assert_eq!(rows[1].generated_at, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn gfa_overview_groups_by_status_and_zone() {
        let plots = vec![
            plot("p1", Some("RESIDENTIAL"), Some(2.8), 100.0),
            plot("p2", Some("RESIDENTIAL"), None, 100.0),
            plot("p3", None, None, 100.0),
        ];
        let results = vec![
            result("p1", Some(280.0), GfaStatus::Ok),
            result("p2", Some(120.5), GfaStatus::ConflictingConstraints),
            result("p3", None, GfaStatus::MissingData),
        ];

        let rows = gfa_overview(&plots, &results, at());
        let find = |group: &str, key: &str| {
            rows.iter()
                .find(|r| r.group == group && r.key == key)
                .unwrap()
        };

        let all = find("all", "all");
        assert_eq!(all.plots, 3);
        assert_eq!(all.with_plot_ratio, 1);
        assert_eq!(all.with_gfa, 2);
        assert!((all.total_gfa - 400.5).abs() < 1e-9);

        assert_eq!(find("status", "missing_data").with_gfa, 0);
        assert_eq!(find("status", "ok").plots, 1);

        let residential = find("zone_type", "RESIDENTIAL");
        assert_eq!(residential.plots, 2);
        assert!((residential.total_gfa - 400.5).abs() < 1e-9);
        assert_eq!(find("zone_type", NO_ZONE_TYPE).plots, 1);
    }

    #[test]
    fn scenario_difference_counts_only_gains_above_threshold() {
        let plots = vec![
            plot("p1", None, None, 200.0),
            plot("p2", None, None, 400.0),
            plot("p3", None, None, 100.0),
            plot("p4", None, None, 100.0),
        ];
        let baseline = vec![
            result("p1", Some(1_000.0), GfaStatus::Ok),
            result("p2", Some(2_000.0), GfaStatus::Ok),
            result("p3", Some(500.0), GfaStatus::Ok),
            result("p4", None, GfaStatus::MissingData),
        ];
        let scenario = vec![
            result("p1", Some(1_100.0), GfaStatus::Ok),
            result("p2", Some(2_300.0), GfaStatus::Ok),
            result("p3", Some(505.0), GfaStatus::Ok),
            result("p4", Some(50.0), GfaStatus::Ok),
        ];

        let rows = scenario_difference(&baseline, &scenario, &plots, None, at());
        let value = |metric: &str| rows.iter().find(|r| r.metric == metric).unwrap().value;

        assert!((value("total_gfa_gain_m2") - 400.0).abs() < 1e-9);
        assert!((value("affected_plots") - 2.0).abs() < 1e-9);
        assert!((value("average_gain_per_affected_plot_m2") - 200.0).abs() < 1e-9);
        assert!((value("average_affected_plot_area_m2") - 300.0).abs() < 1e-9);
        assert!((value("status_changes") - 1.0).abs() < 1e-9);

        let scope: BTreeSet<PlotId> = [PlotId::from("p3")].into_iter().collect();
        let scoped = scenario_difference(&baseline, &scenario, &plots, Some(&scope), at());
        assert!(scoped[1].value.abs() < 1e-9);
        assert!(scoped[2].value.abs() < 1e-9);
    }
}
