//! Result tables and quality reports.

use std::path::Path;

use plot_gfa_zoning_models::{AllowableGfaResult, ConstraintKind, GfaStatus, PlotId, QualityReport};
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// One row of `gfa_results.csv`. Unset values are empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GfaResultRow {
    pub plot_id: String,
    pub allowable_gfa: Option<f64>,
    pub area_candidate: Option<f64>,
    pub type_candidate: Option<f64>,
    pub permitted_storeys: Option<u32>,
    /// `;`-joined constraint kinds.
    pub contributing: String,
    pub status: GfaStatus,
}

impl From<&AllowableGfaResult> for GfaResultRow {
    fn from(result: &AllowableGfaResult) -> Self {
        Self {
            plot_id: result.plot.to_string(),
            allowable_gfa: result.allowable_gfa,
            area_candidate: result.area_candidate,
            type_candidate: result.type_candidate,
            permitted_storeys: result.permitted_storeys,
            contributing: result
                .contributing
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<&str>>()
                .join(";"),
            status: result.status,
        }
    }
}

impl TryFrom<GfaResultRow> for AllowableGfaResult {
    type Error = IngestError;

    fn try_from(row: GfaResultRow) -> Result<Self, Self::Error> {
        let contributing = row
            .contributing
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<ConstraintKind>()
                    .map_err(|_| IngestError::InvalidRow {
                        plot: row.plot_id.clone(),
                        message: format!("unknown constraint kind '{s}'"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            plot: PlotId::new(row.plot_id),
            allowable_gfa: row.allowable_gfa,
            area_candidate: row.area_candidate,
            type_candidate: row.type_candidate,
            permitted_storeys: row.permitted_storeys,
            contributing,
            status: row.status,
        })
    }
}

/// Writes `rows` as CSV with a header derived from `T`.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the file cannot be created or written.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), IngestError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(crate::io_error(path))?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes allowable GFA results.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the file cannot be written.
pub fn write_gfa_results(path: &Path, results: &[AllowableGfaResult]) -> Result<(), IngestError> {
    let rows: Vec<GfaResultRow> = results.iter().map(GfaResultRow::from).collect();
    write_csv(path, &rows)
}

/// Reads results written by [`write_gfa_results`].
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or a row is invalid.
pub fn read_gfa_results(path: &Path) -> Result<Vec<AllowableGfaResult>, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut results = Vec::new();
    for row in reader.deserialize::<GfaResultRow>() {
        results.push(AllowableGfaResult::try_from(row?)?);
    }
    log::debug!("Read {} results from {}", results.len(), path.display());
    Ok(results)
}

/// Writes a quality report as `entity, stage, kind, message` rows.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the file cannot be written.
pub fn write_quality_report(path: &Path, report: &QualityReport) -> Result<(), IngestError> {
    if report.is_empty() {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["entity", "stage", "kind", "message"])?;
        writer.flush().map_err(crate::io_error(path))?;
        log::info!("No quality issues; wrote empty report to {}", path.display());
        return Ok(());
    }
    write_csv(path, report.issues())
}
