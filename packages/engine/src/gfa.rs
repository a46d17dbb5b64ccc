//! Constraint combination.
//!
//! Two candidates are derived independently:
//!
//! * the area candidate, from plot ratio, site coverage times permitted
//!   storeys, and an absolute GFA cap;
//! * the type candidate, from per-storey allocations of the plot's use
//!   type summed up to the permitted storey count.
//!
//! The allowable GFA is the smaller candidate. Candidates further apart
//! than the tolerance ratio are flagged as conflicting; a plot with no
//! candidate is missing data and has no GFA. So is a plot whose footprint
//! could not be resolved in some layer, since constraints of that layer
//! may be missing from its bundle.
//!
//! Permitted storeys are capped at [`GfaConfig::max_storeys`], and the
//! type candidate is summed over spans of storeys sharing one allocation,
//! so its cost depends on the number of records and not on the height.

use std::collections::BTreeSet;

use plot_gfa_config::GfaConfig;
use plot_gfa_overlay::ProgressCallback;
use plot_gfa_zoning_models::{
    AllowableGfaResult, ConstraintKind, GfaStatus, IssueKind, LayerId, PlotConstraintBundle,
    PlotConstraintBundleSet, QualityReport, Stage, TypeRegulationRecord,
};

struct Candidate {
    value: f64,
    kinds: BTreeSet<ConstraintKind>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_storeys(value: f64) -> u32 {
    value.floor().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Storeys allowed by the height constraints, with the kinds used.
fn permitted_storeys(
    bundle: &PlotConstraintBundle,
    settings: &GfaConfig,
) -> Option<(u32, BTreeSet<ConstraintKind>)> {
    let mut best: Option<u32> = None;
    let mut kinds = BTreeSet::new();

    if let Some(limit) = bundle.most_restrictive(ConstraintKind::StoreyLimit) {
        best = Some(whole_storeys(limit));
        kinds.insert(ConstraintKind::StoreyLimit);
    }

    if let Some(height) = bundle.most_restrictive(ConstraintKind::AbsoluteHeight) {
        let floor_height = bundle
            .most_restrictive(ConstraintKind::FloorToFloorHeight)
            .filter(|h| *h > 0.0);
        let storey_height = floor_height
            .unwrap_or_else(|| settings.storey_height_for(bundle.zone_type.as_deref()));
        let from_height = whole_storeys(height / storey_height);

        best = Some(best.map_or(from_height, |b| b.min(from_height)));
        kinds.insert(ConstraintKind::AbsoluteHeight);
        if floor_height.is_some() {
            kinds.insert(ConstraintKind::FloorToFloorHeight);
        }
    }

    best.map(|storeys| (storeys, kinds))
}

fn area_candidate(
    bundle: &PlotConstraintBundle,
    storeys: Option<&(u32, BTreeSet<ConstraintKind>)>,
) -> Option<Candidate> {
    let site = bundle.site_area;
    let mut terms: Vec<(f64, Vec<ConstraintKind>)> = Vec::new();

    if site > 0.0 {
        if let Some(ratio) = bundle.most_restrictive(ConstraintKind::PlotRatio) {
            terms.push((ratio * site, vec![ConstraintKind::PlotRatio]));
        }
        if let (Some(coverage), Some((count, height_kinds))) =
            (bundle.most_restrictive(ConstraintKind::SiteCoverage), storeys)
        {
            let mut kinds = vec![ConstraintKind::SiteCoverage];
            kinds.extend(height_kinds.iter().copied());
            terms.push((coverage * f64::from(*count) * site, kinds));
        }
    }
    if let Some(cap) = bundle.most_restrictive(ConstraintKind::MaxGrossFloorArea) {
        terms.push((cap, vec![ConstraintKind::MaxGrossFloorArea]));
    }

    terms
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(value, kinds)| Candidate {
            value,
            kinds: kinds.into_iter().collect(),
        })
}

/// Allocation of one kind at `storey`: an exact record, else the highest
/// open-ended record starting at or below it.
fn allocation_at(
    records: &[TypeRegulationRecord],
    kind: ConstraintKind,
    storey: u32,
) -> Option<f64> {
    let of_kind = || records.iter().filter(move |r| r.kind == kind);

    of_kind()
        .filter(|r| r.storey == storey)
        .map(|r| r.value)
        .min_by(f64::total_cmp)
        .or_else(|| {
            let start = of_kind()
                .filter(|r| r.open_ended && r.storey < storey)
                .map(|r| r.storey)
                .max()?;
            of_kind()
                .filter(|r| r.open_ended && r.storey == start)
                .map(|r| r.value)
                .min_by(f64::total_cmp)
        })
}

/// Splits storeys `1..=top` into `(first storey, length)` spans over which
/// every allocation is constant. A storey named by a record is a span of
/// its own; each gap between named storeys repeats the open-ended
/// allocation below it.
fn constant_spans(records: &[TypeRegulationRecord], top: u32) -> Vec<(u32, u32)> {
    let marks: BTreeSet<u32> = records
        .iter()
        .map(|r| r.storey)
        .filter(|s| (1..=top).contains(s))
        .collect();

    let mut spans = Vec::with_capacity(marks.len() * 2 + 1);
    let mut next = Some(1_u32);
    for mark in marks {
        let Some(start) = next else { break };
        if mark > start {
            spans.push((start, mark - start));
        }
        spans.push((mark, 1));
        next = mark.checked_add(1);
    }
    if let Some(start) = next
        && start <= top
    {
        spans.push((start, top - start + 1));
    }
    spans
}

fn type_candidate(
    bundle: &PlotConstraintBundle,
    storeys: Option<&(u32, BTreeSet<ConstraintKind>)>,
) -> Option<Candidate> {
    let records = &bundle.type_records;
    let top = match storeys {
        Some((count, _)) => *count,
        None => records.iter().map(|r| r.storey).max()?,
    };

    let mut total = 0.0;
    let mut kinds = BTreeSet::new();

    for (storey, length) in constant_spans(records, top) {
        let floor_area = allocation_at(records, ConstraintKind::StoreyFloorArea, storey);
        let coverage = allocation_at(records, ConstraintKind::StoreyCoverage, storey)
            .filter(|_| bundle.site_area > 0.0)
            .map(|c| c * bundle.site_area);

        let allocation = match (floor_area, coverage) {
            (Some(a), Some(c)) => {
                kinds.insert(ConstraintKind::StoreyFloorArea);
                kinds.insert(ConstraintKind::StoreyCoverage);
                a.min(c)
            }
            (Some(a), None) => {
                kinds.insert(ConstraintKind::StoreyFloorArea);
                a
            }
            (None, Some(c)) => {
                kinds.insert(ConstraintKind::StoreyCoverage);
                c
            }
            (None, None) => continue,
        };
        total += allocation * f64::from(length);
    }

    if kinds.is_empty() {
        return None;
    }
    if let Some((_, height_kinds)) = storeys {
        kinds.extend(height_kinds.iter().copied());
    }

    Some(Candidate {
        value: total,
        kinds,
    })
}

fn exceeds_tolerance(a: f64, b: f64, tolerance_ratio: f64) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo <= 0.0 {
        hi > 0.0
    } else {
        hi / lo > tolerance_ratio
    }
}

/// Computes the allowable GFA of one plot.
#[must_use]
pub fn compute_allowable_gfa(
    bundle: &PlotConstraintBundle,
    settings: &GfaConfig,
) -> AllowableGfaResult {
    let storeys = permitted_storeys(bundle, settings)
        .map(|(count, kinds)| (count.min(settings.max_storeys), kinds));
    let area = area_candidate(bundle, storeys.as_ref());
    let typed = type_candidate(bundle, storeys.as_ref());

    let mut contributing = BTreeSet::new();
    for candidate in [&area, &typed].into_iter().flatten() {
        contributing.extend(candidate.kinds.iter().copied());
    }

    let area_value = area.map(|c| c.value);
    let type_value = typed.map(|c| c.value);

    let (allowable_gfa, status) = match (area_value, type_value) {
        (Some(a), Some(t)) => {
            let status = if exceeds_tolerance(a, t, settings.tolerance_ratio) {
                GfaStatus::ConflictingConstraints
            } else {
                GfaStatus::Ok
            };
            (Some(a.min(t)), status)
        }
        (Some(v), None) | (None, Some(v)) => (Some(v), GfaStatus::Ok),
        (None, None) => (None, GfaStatus::MissingData),
    };
    let (allowable_gfa, status) = if bundle.unresolved_layers.is_empty() {
        (allowable_gfa, status)
    } else {
        (None, GfaStatus::MissingData)
    };

    AllowableGfaResult {
        plot: bundle.plot.clone(),
        allowable_gfa,
        area_candidate: area_value,
        type_candidate: type_value,
        permitted_storeys: storeys.map(|(count, _)| count),
        contributing: contributing.into_iter().collect(),
        status,
    }
}

/// Computes the allowable GFA of every bundle, in plot order.
///
/// Conflicting plots are recorded in `report` for manual review.
pub fn estimate(
    bundles: &PlotConstraintBundleSet,
    settings: &GfaConfig,
    report: &mut QualityReport,
    progress: &dyn ProgressCallback,
) -> Vec<AllowableGfaResult> {
    progress.begin(Stage::Engine, bundles.len() as u64, 0);

    let mut results = Vec::with_capacity(bundles.len());
    for bundle in bundles.iter() {
        let result = compute_allowable_gfa(bundle, settings);

        if let Some((count, _)) = permitted_storeys(bundle, settings)
            && count > settings.max_storeys
        {
            report.record(
                result.plot.as_str(),
                Stage::Engine,
                IssueKind::DataQuality,
                format!("{count} permitted storeys capped at {}", settings.max_storeys),
            );
        }
        if !bundle.unresolved_layers.is_empty() {
            let layers: Vec<&str> = bundle
                .unresolved_layers
                .iter()
                .map(LayerId::as_str)
                .collect();
            report.record(
                result.plot.as_str(),
                Stage::Engine,
                IssueKind::Geometry,
                format!("GFA withheld, unresolved in {}", layers.join(", ")),
            );
        }

        match result.status {
            GfaStatus::ConflictingConstraints => report.record(
                result.plot.as_str(),
                Stage::Engine,
                IssueKind::Conflict,
                format!(
                    "area candidate {:?} and type candidate {:?} differ by more than {}x",
                    result.area_candidate, result.type_candidate, settings.tolerance_ratio
                ),
            ),
            GfaStatus::MissingData => log::debug!("{}: no GFA constraint", result.plot),
            GfaStatus::Ok => {}
        }

        results.push(result);
        progress.advance(1);
    }

    let missing = results
        .iter()
        .filter(|r| r.status == GfaStatus::MissingData)
        .count();
    let conflicting = results
        .iter()
        .filter(|r| r.status == GfaStatus::ConflictingConstraints)
        .count();
    progress.finish(format!("Estimated GFA for {} plots", results.len()));
    log::info!(
        "Estimated allowable GFA for {} plots ({missing} missing data, {conflicting} conflicting)",
        results.len()
    );

    results
}

#[cfg(test)]
mod tests {
    use plot_gfa_overlay::NullProgress;
    use plot_gfa_zoning_models::{AreaRegulationRecord, UseType};

    use super::*;

    fn area(kind: ConstraintKind, value: f64) -> AreaRegulationRecord {
        AreaRegulationRecord {
            layer: "height".into(),
            zone: "z1".into(),
            kind,
            value,
        }
    }

    fn typed(
        storey: u32,
        kind: ConstraintKind,
        value: f64,
        open_ended: bool,
    ) -> TypeRegulationRecord {
        TypeRegulationRecord {
            use_type: UseType::from("Flat"),
            storey,
            kind,
            value,
            open_ended,
        }
    }

    fn bundle(
        site_area: f64,
        area_records: Vec<AreaRegulationRecord>,
        type_records: Vec<TypeRegulationRecord>,
    ) -> PlotConstraintBundle {
        PlotConstraintBundle {
            plot: "p1".into(),
            zone_type: Some("RESIDENTIAL".to_string()),
            use_type: Some("Flat".into()),
            site_area,
            area_records,
            type_records,
            absent_layers: vec![],
            unresolved_layers: vec![],
        }
    }

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-6)
    }

    fn floors(count: u32, value: f64) -> Vec<TypeRegulationRecord> {
        (1..=count)
            .map(|s| typed(s, ConstraintKind::StoreyFloorArea, value, false))
            .collect()
    }

    #[test]
    fn smaller_candidate_wins_within_tolerance() {
        let b = bundle(10_000.0, vec![area(ConstraintKind::PlotRatio, 5.0)], floors(4, 10_000.0));
        let result = compute_allowable_gfa(&b, &GfaConfig::default());

        assert!(approx(result.area_candidate, 50_000.0));
        assert!(approx(result.type_candidate, 40_000.0));
        assert!(approx(result.allowable_gfa, 40_000.0));
        assert_eq!(result.status, GfaStatus::Ok);
        assert_eq!(
            result.contributing,
            vec![ConstraintKind::PlotRatio, ConstraintKind::StoreyFloorArea]
        );
    }

    #[test]
    fn far_apart_candidates_conflict() {
        let b = bundle(10_000.0, vec![area(ConstraintKind::PlotRatio, 5.0)], floors(1, 10_000.0));
        let result = compute_allowable_gfa(&b, &GfaConfig::default());

        assert!(approx(result.allowable_gfa, 10_000.0));
        assert_eq!(result.status, GfaStatus::ConflictingConstraints);
    }

    #[test]
    fn no_constraint_is_missing_data_not_zero() {
        let result = compute_allowable_gfa(&bundle(500.0, vec![], vec![]), &GfaConfig::default());
        assert_eq!(result.allowable_gfa, None);
        assert_eq!(result.status, GfaStatus::MissingData);
        assert!(result.contributing.is_empty());
    }

    #[test]
    fn zero_site_area_without_absolute_cap_is_missing_data() {
        let b = bundle(0.0, vec![area(ConstraintKind::PlotRatio, 2.0)], vec![]);
        let result = compute_allowable_gfa(&b, &GfaConfig::default());
        assert_eq!(result.status, GfaStatus::MissingData);

        let capped = bundle(0.0, vec![area(ConstraintKind::MaxGrossFloorArea, 800.0)], vec![]);
        assert!(approx(
            compute_allowable_gfa(&capped, &GfaConfig::default()).allowable_gfa,
            800.0
        ));
    }

    #[test]
    fn coverage_times_storeys_caps_plot_ratio() {
        // Residential storey height 3.6 m: 20 m allows 5 storeys.
        let b = bundle(
            1_000.0,
            vec![
                area(ConstraintKind::PlotRatio, 3.0),
                area(ConstraintKind::SiteCoverage, 0.4),
                area(ConstraintKind::AbsoluteHeight, 20.0),
            ],
            vec![],
        );
        let result = compute_allowable_gfa(&b, &GfaConfig::default());

        assert_eq!(result.permitted_storeys, Some(5));
        assert!(approx(result.allowable_gfa, 2_000.0));
        assert_eq!(
            result.contributing,
            vec![ConstraintKind::SiteCoverage, ConstraintKind::AbsoluteHeight]
        );
    }

    #[test]
    fn storey_limit_and_floor_height_take_the_minimum() {
        let b = bundle(
            1_000.0,
            vec![
                area(ConstraintKind::StoreyLimit, 12.0),
                area(ConstraintKind::AbsoluteHeight, 40.0),
                area(ConstraintKind::FloorToFloorHeight, 4.0),
            ],
            vec![],
        );
        let result = compute_allowable_gfa(&b, &GfaConfig::default());
        assert_eq!(result.permitted_storeys, Some(10));
        // Height alone yields no candidate.
        assert_eq!(result.status, GfaStatus::MissingData);
    }

    #[test]
    fn duplicate_records_use_most_restrictive_value() {
        let b = bundle(
            1_000.0,
            vec![
                area(ConstraintKind::PlotRatio, 2.8),
                AreaRegulationRecord {
                    layer: "masterplan".into(),
                    zone: "p1".into(),
                    kind: ConstraintKind::PlotRatio,
                    value: 1.4,
                },
            ],
            vec![],
        );
        assert!(approx(
            compute_allowable_gfa(&b, &GfaConfig::default()).allowable_gfa,
            1_400.0
        ));
    }

    #[test]
    fn open_ended_allocation_fills_storeys_up_to_limit() {
        let b = bundle(
            1_000.0,
            vec![area(ConstraintKind::StoreyLimit, 4.0)],
            vec![
                typed(1, ConstraintKind::StoreyFloorArea, 600.0, false),
                typed(2, ConstraintKind::StoreyCoverage, 0.3, true),
                typed(3, ConstraintKind::StoreyFloorArea, 250.0, true),
            ],
        );
        // 600 + 300 + min(250, 300) + min(250, 300)
        let result = compute_allowable_gfa(&b, &GfaConfig::default());
        assert!(approx(result.type_candidate, 1_400.0));
        assert_eq!(result.area_candidate, None);
        assert!(approx(result.allowable_gfa, 1_400.0));
    }

    #[test]
    fn zero_candidate_against_positive_conflicts() {
        let b = bundle(
            1_000.0,
            vec![area(ConstraintKind::PlotRatio, 0.0)],
            floors(1, 100.0),
        );
        let result = compute_allowable_gfa(&b, &GfaConfig::default());
        assert_eq!(result.status, GfaStatus::ConflictingConstraints);
        assert!(approx(result.allowable_gfa, 0.0));
    }

    #[test]
    fn huge_storey_limit_is_capped_and_summed_per_span() {
        let b = bundle(
            1_000.0,
            vec![area(ConstraintKind::StoreyLimit, f64::from(u32::MAX))],
            vec![
                typed(1, ConstraintKind::StoreyFloorArea, 800.0, false),
                typed(2, ConstraintKind::StoreyFloorArea, 500.0, true),
            ],
        );
        let settings = GfaConfig::default();
        let result = compute_allowable_gfa(&b, &settings);

        assert_eq!(result.permitted_storeys, Some(settings.max_storeys));
        let expected = 800.0 + 500.0 * f64::from(settings.max_storeys - 1);
        assert!(approx(result.type_candidate, expected));

        let mut report = QualityReport::new();
        let set = PlotConstraintBundleSet::from_bundles(vec![b]);
        estimate(&set, &settings, &mut report, &NullProgress);
        assert_eq!(report.count(IssueKind::DataQuality), 1);
    }

    #[test]
    fn spans_cover_every_storey_once() {
        let records = vec![
            typed(3, ConstraintKind::StoreyFloorArea, 1.0, false),
            typed(6, ConstraintKind::StoreyFloorArea, 1.0, true),
            typed(40, ConstraintKind::StoreyFloorArea, 1.0, false),
        ];
        assert_eq!(
            constant_spans(&records, 10),
            vec![(1, 2), (3, 1), (4, 2), (6, 1), (7, 4)]
        );
        assert_eq!(constant_spans(&records, 0), vec![]);
        assert_eq!(
            constant_spans(&records, u32::MAX).last(),
            Some(&(41, u32::MAX - 40))
        );
    }

    #[test]
    fn unresolved_layer_withholds_gfa() {
        let mut b = bundle(
            0.0,
            vec![],
            vec![typed(1, ConstraintKind::StoreyFloorArea, 500.0, false)],
        );
        b.unresolved_layers = vec!["height".into()];
        let result = compute_allowable_gfa(&b, &GfaConfig::default());

        assert_eq!(result.status, GfaStatus::MissingData);
        assert_eq!(result.allowable_gfa, None);
        assert!(approx(result.type_candidate, 500.0));

        let mut report = QualityReport::new();
        let set = PlotConstraintBundleSet::from_bundles(vec![b]);
        estimate(&set, &GfaConfig::default(), &mut report, &NullProgress);
        assert_eq!(report.count(IssueKind::Geometry), 1);
    }

    #[test]
    fn estimate_reports_conflicts() {
        let set = PlotConstraintBundleSet::from_bundles(vec![bundle(
            10_000.0,
            vec![area(ConstraintKind::PlotRatio, 5.0)],
            floors(1, 10_000.0),
        )]);
        let mut report = QualityReport::new();
        let results = estimate(&set, &GfaConfig::default(), &mut report, &NullProgress);

        assert_eq!(results.len(), 1);
        assert_eq!(report.count(IssueKind::Conflict), 1);
    }
}
