//! Regulation table normalization.
//!
//! Header aliases map heterogeneous column names onto [`ConstraintKind`]s,
//! cell values are parsed into the kind's canonical unit, zone and use-type
//! lists are split, and storey bands are expanded so every record is keyed
//! by plain equality. Cells that fail to parse are dropped with a
//! data-quality issue; they are never coerced to zero.

use std::collections::BTreeSet;

use plot_gfa_zoning_models::{
    AreaRegulationRecord, ConstraintKind, IssueKind, LayerId, QualityReport, Stage,
    TypeRegulationRecord, Unit, UseType, ZoneId,
};

use crate::storeys::{format_storey, parse_storey_range};
use crate::{RawTable, RegulationError, canonical_header};

const LAYER_ALIASES: &[&str] = &["layer", "theme"];
const ZONE_ALIASES: &[&str] = &["zone", "zone_id", "zones", "ext_ref"];
const USE_TYPE_ALIASES: &[&str] = &["use_type", "programme", "for_programme", "use"];
const STOREY_ALIASES: &[&str] = &["storeys", "storey", "storey_range", "tier"];

/// Maps an area-table header onto its constraint kind.
#[must_use]
pub fn area_column_kind(header: &str) -> Option<ConstraintKind> {
    Some(match canonical_header(header).as_str() {
        "gpr" | "plot_ratio" | "gross_plot_ratio" => ConstraintKind::PlotRatio,
        "site_coverage" | "coverage" => ConstraintKind::SiteCoverage,
        "storeys" | "max_storeys" | "storey_limit" => ConstraintKind::StoreyLimit,
        "height" | "abs_height" | "max_height" | "height_m" => ConstraintKind::AbsoluteHeight,
        "floor_height" | "floor_to_floor_height" => ConstraintKind::FloorToFloorHeight,
        "setback" | "setback_m" => ConstraintKind::Setback,
        "max_gfa" | "gfa_cap" => ConstraintKind::MaxGrossFloorArea,
        _ => return None,
    })
}

/// Maps a type-table allocation header onto its constraint kind.
#[must_use]
pub fn type_column_kind(header: &str) -> Option<ConstraintKind> {
    Some(match canonical_header(header).as_str() {
        "floor_area" | "gfa_per_storey" => ConstraintKind::StoreyFloorArea,
        "coverage" | "site_coverage" => ConstraintKind::StoreyCoverage,
        _ => return None,
    })
}

/// Header written by [`area_records_to_rows`] for each area kind.
const fn area_header(kind: ConstraintKind) -> &'static str {
    match kind {
        ConstraintKind::PlotRatio => "plot_ratio",
        ConstraintKind::SiteCoverage => "site_coverage",
        ConstraintKind::StoreyLimit => "storey_limit",
        ConstraintKind::AbsoluteHeight => "abs_height",
        ConstraintKind::FloorToFloorHeight => "floor_to_floor_height",
        ConstraintKind::Setback => "setback",
        ConstraintKind::MaxGrossFloorArea => "max_gfa",
        ConstraintKind::StoreyFloorArea => "floor_area",
        ConstraintKind::StoreyCoverage => "coverage",
    }
}

/// Parses one cell into `kind`'s unit.
///
/// Returns `Ok(None)` for an empty cell.
///
/// # Errors
///
/// Returns a description when the cell is not a finite non-negative
/// number, or a coverage exceeds 100%.
pub fn parse_value(raw: &str, kind: ConstraintKind) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let unit = kind.unit();
    let mut text = trimmed.replace(',', "");
    let mut percent = false;

    match unit {
        Unit::Fraction => {
            if let Some(stripped) = text.strip_suffix('%') {
                percent = true;
                text = stripped.trim_end().to_string();
            }
        }
        Unit::Metre => {
            if let Some(stripped) = text.strip_suffix(['m', 'M']) {
                text = stripped.trim_end().to_string();
            }
        }
        Unit::SquareMetre => {
            for suffix in ["m²", "m2", "sqm"] {
                if let Some(stripped) = text.strip_suffix(suffix) {
                    text = stripped.trim_end().to_string();
                    break;
                }
            }
        }
        Unit::Ratio | Unit::Storeys => {}
    }

    let value: f64 = text
        .parse()
        .map_err(|_| format!("{kind} value '{trimmed}' is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!(
            "{kind} value '{trimmed}' is not a finite non-negative number"
        ));
    }

    if unit == Unit::Fraction {
        let fraction = if percent || value > 1.0 {
            value / 100.0
        } else {
            value
        };
        if fraction > 1.0 {
            return Err(format!("{kind} value '{trimmed}' exceeds 100%"));
        }
        return Ok(Some(fraction));
    }

    Ok(Some(value))
}

fn split_list(cell: &str) -> Vec<&str> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn row_ref(table: &RawTable, index: usize) -> String {
    format!("{} row {}", table.name, index + 1)
}

/// Normalizes an area-based regulation table.
///
/// Each non-empty constraint cell produces one record per listed zone.
/// Records are returned in canonical order with exact duplicates removed.
///
/// # Errors
///
/// Returns [`RegulationError`] when the layer or zone column is missing or
/// rows are ragged. Per-cell problems are recorded in `report`.
pub fn normalize_area_table(
    table: &RawTable,
    report: &mut QualityReport,
) -> Result<Vec<AreaRegulationRecord>, RegulationError> {
    table.check_shape()?;

    let layer_col = table
        .column(LAYER_ALIASES)
        .ok_or_else(|| missing(table, "layer"))?;
    let zone_col = table
        .column(ZONE_ALIASES)
        .ok_or_else(|| missing(table, "zone"))?;

    let mut kind_cols = Vec::new();
    for (i, header) in table.headers.iter().enumerate() {
        if i == layer_col || i == zone_col {
            continue;
        }
        match area_column_kind(header) {
            Some(kind) => kind_cols.push((i, kind)),
            None => log::debug!("{}: ignoring column '{header}'", table.name),
        }
    }

    let mut records = Vec::new();

    for (index, row) in table.rows.iter().enumerate() {
        let layer = row[layer_col].trim();
        let zones = split_list(&row[zone_col]);
        if layer.is_empty() || zones.is_empty() {
            report.record(
                row_ref(table, index),
                Stage::Normalize,
                IssueKind::DataQuality,
                "row has no layer or zone; dropped",
            );
            continue;
        }

        for &(col, kind) in &kind_cols {
            let value = match parse_value(&row[col], kind) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(message) => {
                    report.record(
                        row_ref(table, index),
                        Stage::Normalize,
                        IssueKind::DataQuality,
                        message,
                    );
                    continue;
                }
            };

            for zone in &zones {
                records.push(AreaRegulationRecord {
                    layer: LayerId::from(layer),
                    zone: ZoneId::from(*zone),
                    kind,
                    value,
                });
            }
        }
    }

    records.sort_by(AreaRegulationRecord::canonical_cmp);
    records.dedup();

    log::info!(
        "Normalized {} area regulation records from {} rows of '{}'",
        records.len(),
        table.rows.len(),
        table.name
    );

    Ok(records)
}

/// Normalizes a type-based regulation table.
///
/// Storey bands expand into one record per storey; an open-ended band
/// yields a single record at its first storey with `open_ended` set.
///
/// # Errors
///
/// Returns [`RegulationError`] when the use-type, storey or allocation
/// column is missing or rows are ragged. Per-cell problems are recorded
/// in `report`.
pub fn normalize_type_table(
    table: &RawTable,
    report: &mut QualityReport,
) -> Result<Vec<TypeRegulationRecord>, RegulationError> {
    table.check_shape()?;

    let use_col = table
        .column(USE_TYPE_ALIASES)
        .ok_or_else(|| missing(table, "use type"))?;
    let storey_col = table
        .column(STOREY_ALIASES)
        .ok_or_else(|| missing(table, "storey range"))?;

    let kind_cols: Vec<(usize, ConstraintKind)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != use_col && *i != storey_col)
        .filter_map(|(i, h)| type_column_kind(h).map(|kind| (i, kind)))
        .collect();
    if kind_cols.is_empty() {
        return Err(missing(table, "floor area or coverage"));
    }

    let mut records = Vec::new();

    for (index, row) in table.rows.iter().enumerate() {
        let entity = row_ref(table, index);
        let use_types = split_list(&row[use_col]);
        if use_types.is_empty() {
            report.record(
                entity,
                Stage::Normalize,
                IssueKind::DataQuality,
                "row has no use type; dropped",
            );
            continue;
        }

        let range = match parse_storey_range(&row[storey_col]) {
            Ok(range) => range,
            Err(message) => {
                report.record(entity, Stage::Normalize, IssueKind::DataQuality, message);
                continue;
            }
        };

        let mut allocated = false;
        for &(col, kind) in &kind_cols {
            let value = match parse_value(&row[col], kind) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(message) => {
                    report.record(
                        entity.clone(),
                        Stage::Normalize,
                        IssueKind::DataQuality,
                        message,
                    );
                    continue;
                }
            };
            allocated = true;

            for use_type in &use_types {
                for storey in range.storeys() {
                    records.push(TypeRegulationRecord {
                        use_type: UseType::from(*use_type),
                        storey,
                        kind,
                        value,
                        open_ended: range.is_open_ended(),
                    });
                }
            }
        }

        if !allocated {
            log::debug!("{entity}: no usable allocation");
        }
    }

    records.sort_by(TypeRegulationRecord::canonical_cmp);
    records.dedup();

    log::info!(
        "Normalized {} type regulation records from {} rows of '{}'",
        records.len(),
        table.rows.len(),
        table.name
    );

    Ok(records)
}

fn missing(table: &RawTable, column: &'static str) -> RegulationError {
    RegulationError::MissingColumn {
        table: table.name.clone(),
        column,
    }
}

/// Writes area records back as a canonical table, one kind per row.
#[must_use]
pub fn area_records_to_rows(records: &[AreaRegulationRecord]) -> RawTable {
    let kinds: BTreeSet<ConstraintKind> = records.iter().map(|r| r.kind).collect();
    let kinds: Vec<ConstraintKind> = kinds.into_iter().collect();

    let mut headers = vec!["layer".to_string(), "zone".to_string()];
    headers.extend(kinds.iter().map(|k| area_header(*k).to_string()));
    let mut table = RawTable::new("area_regulations", headers);

    for record in records {
        let mut row = vec![record.layer.to_string(), record.zone.to_string()];
        row.extend(kinds.iter().map(|k| {
            if *k == record.kind {
                record.value.to_string()
            } else {
                String::new()
            }
        }));
        table.rows.push(row);
    }

    table
}

/// Writes type records back as a canonical table, one kind per row.
#[must_use]
pub fn type_records_to_rows(records: &[TypeRegulationRecord]) -> RawTable {
    let kinds: BTreeSet<ConstraintKind> = records.iter().map(|r| r.kind).collect();
    let kinds: Vec<ConstraintKind> = kinds.into_iter().collect();

    let mut headers = vec!["use_type".to_string(), "storeys".to_string()];
    headers.extend(kinds.iter().map(|k| area_header(*k).to_string()));
    let mut table = RawTable::new("type_regulations", headers);

    for record in records {
        let mut row = vec![
            record.use_type.to_string(),
            format_storey(record.storey, record.open_ended),
        ];
        row.extend(kinds.iter().map(|k| {
            if *k == record.kind {
                record.value.to_string()
            } else {
                String::new()
            }
        }));
        table.rows.push(row);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        let mut t = RawTable::new(name, headers.iter().map(|h| (*h).to_string()).collect());
        t.rows = rows
            .iter()
            .map(|r| r.iter().map(|c| (*c).to_string()).collect())
            .collect();
        t
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parses_units() {
        let cov = ConstraintKind::SiteCoverage;
        assert!(approx(parse_value("0.4", cov).unwrap().unwrap(), 0.4));
        assert!(approx(parse_value("40", cov).unwrap().unwrap(), 0.4));
        assert!(approx(parse_value("40 %", cov).unwrap().unwrap(), 0.4));
        assert!(approx(parse_value("1%", cov).unwrap().unwrap(), 0.01));
        assert!(
            approx(parse_value("36.5m", ConstraintKind::AbsoluteHeight).unwrap().unwrap(), 36.5)
        );
        assert!(approx(
            parse_value("12,500 m2", ConstraintKind::MaxGrossFloorArea).unwrap().unwrap(),
            12_500.0
        ));
        assert_eq!(parse_value("  ", ConstraintKind::PlotRatio), Ok(None));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_value("-1", ConstraintKind::PlotRatio).is_err());
        assert!(parse_value("abc", ConstraintKind::PlotRatio).is_err());
        assert!(parse_value("NaN", ConstraintKind::PlotRatio).is_err());
        assert!(parse_value("inf", ConstraintKind::StoreyLimit).is_err());
        assert!(parse_value("250%", ConstraintKind::SiteCoverage).is_err());
    }

    #[test]
    fn area_table_expands_zone_lists_and_drops_bad_cells() {
        let t = table(
            "area",
            &["Layer", "Zone ID", "GPR", "Max Storeys", "Remarks"],
            &[
                &["height_control", "hc1; hc2", "2.8", "12", "note"],
                &["height_control", "hc3", "abc", "5", ""],
                &["", "hc4", "1.0", "", ""],
            ],
        );
        let mut report = QualityReport::new();
        let records = normalize_area_table(&t, &mut report).unwrap();

        let keys: Vec<(&str, ConstraintKind)> = records
            .iter()
            .map(|r| (r.zone.as_str(), r.kind))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("hc1", ConstraintKind::PlotRatio),
                ("hc1", ConstraintKind::StoreyLimit),
                ("hc2", ConstraintKind::PlotRatio),
                ("hc2", ConstraintKind::StoreyLimit),
                ("hc3", ConstraintKind::StoreyLimit),
            ]
        );
        assert_eq!(report.count(IssueKind::DataQuality), 2);
    }

    #[test]
    fn area_table_requires_zone_column() {
        let t = table("area", &["layer", "gpr"], &[]);
        let err = normalize_area_table(&t, &mut QualityReport::new()).unwrap_err();
        assert!(matches!(
            err,
            RegulationError::MissingColumn { column: "zone", .. }
        ));
    }

    #[test]
    fn type_table_expands_storey_bands() {
        let t = table(
            "type",
            &["Programme", "Storeys", "GFA per storey", "Coverage"],
            &[
                &["Flat", "1-3", "500", ""],
                &["Flat", "4+", "", "30%"],
                &["Flat;Condo", "storeys 5 to 4", "100", ""],
                &["Condo", "1-4000000000", "100", ""],
            ],
        );
        let mut report = QualityReport::new();
        let records = normalize_type_table(&t, &mut report).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            records.iter().map(|r| r.storey).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(records[3].open_ended);
        assert_eq!(records[3].kind, ConstraintKind::StoreyCoverage);
        assert!(approx(records[3].value, 0.3));
        assert_eq!(report.count(IssueKind::DataQuality), 2);
    }

    #[test]
    fn area_round_trip_is_lossless() {
        let t = table(
            "area",
            &["theme", "zones", "gpr", "coverage", "height", "setback", "max_gfa"],
            &[
                &["central", "c1", "4.2", "55%", "80m", "7.5", ""],
                &["conservation", "k1;k2", "", "0.6", "", "", "12000"],
            ],
        );
        let mut report = QualityReport::new();
        let first = normalize_area_table(&t, &mut report).unwrap();
        let again = normalize_area_table(&area_records_to_rows(&first), &mut report).unwrap();
        assert_eq!(first, again);
        assert!(report.is_empty());
    }

    #[test]
    fn type_round_trip_is_lossless() {
        let t = table(
            "type",
            &["use_type", "tier", "floor_area", "site_coverage"],
            &[
                &["Flat", "1-2", "450.5", ""],
                &["Flat", "3 and above", "", "0.25"],
                &["Shop", "1", "", "80"],
            ],
        );
        let mut report = QualityReport::new();
        let first = normalize_type_table(&t, &mut report).unwrap();
        let again = normalize_type_table(&type_records_to_rows(&first), &mut report).unwrap();
        assert_eq!(first, again);
        assert!(report.is_empty());
    }
}
