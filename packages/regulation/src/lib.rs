#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Regulation tables: normalization into constraint records and linking of
//! those records to plots.
//!
//! [`normalize`] turns loosely formatted regulation tables into
//! [`AreaRegulationRecord`]s and [`TypeRegulationRecord`]s with canonical
//! constraint kinds, finite non-negative values and explicit per-storey
//! keys. [`link`] joins them with the overlay result and plot attributes
//! through in-memory keyed maps.
//!
//! [`AreaRegulationRecord`]: plot_gfa_zoning_models::AreaRegulationRecord
//! [`TypeRegulationRecord`]: plot_gfa_zoning_models::TypeRegulationRecord

pub mod link;
pub mod normalize;
pub mod storeys;

pub use link::{RegulationIndex, link};
pub use normalize::{
    area_records_to_rows, normalize_area_table, normalize_type_table, type_records_to_rows,
};
pub use storeys::{StoreyRange, parse_storey_range};

/// Errors that prevent a regulation table from being used at all.
#[derive(Debug, thiserror::Error)]
pub enum RegulationError {
    /// A column the table cannot be interpreted without is missing.
    #[error("Table '{table}' has no {column} column")]
    MissingColumn {
        /// Table name.
        table: String,
        /// Human-readable column role.
        column: &'static str,
    },

    /// A row has a different number of cells than the header.
    #[error("Table '{table}' row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        /// Table name.
        table: String,
        /// One-based data row number.
        row: usize,
        /// Cells in the header.
        expected: usize,
        /// Cells in the row.
        found: usize,
    },
}

/// A table as an ordered sequence of rows with named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Table name used in diagnostics (usually the file stem).
    pub name: String,
    /// Column headers, in file order.
    pub headers: Vec<String>,
    /// Data rows; each row has one cell per header.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Creates an empty table with the given headers.
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Index of the first header whose canonical form is one of `aliases`.
    #[must_use]
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.contains(&canonical_header(h).as_str()))
    }

    /// Checks that every row has one cell per header.
    ///
    /// # Errors
    ///
    /// Returns [`RegulationError::RaggedRow`] for the first mismatching row.
    pub fn check_shape(&self) -> Result<(), RegulationError> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.headers.len() {
                return Err(RegulationError::RaggedRow {
                    table: self.name.clone(),
                    row: i + 1,
                    expected: self.headers.len(),
                    found: row.len(),
                });
            }
        }
        Ok(())
    }
}

/// Lower-cases a header and folds spaces, hyphens and dots into single
/// underscores: `"Max. Height (m)"` becomes `"max_height_m"`.
#[must_use]
pub fn canonical_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
