#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading pipeline inputs and writing pipeline outputs.
//!
//! Plots and regulation zone layers come from GeoJSON feature
//! collections, regulation tables from CSV. Malformed features are
//! skipped with a [`QualityIssue`] rather than failing the load; only a
//! file that cannot be read or parsed at all is an [`IngestError`].
//!
//! [`QualityIssue`]: plot_gfa_zoning_models::QualityIssue

pub mod features;
pub mod output;
pub mod table;

use std::path::{Path, PathBuf};

pub use features::{
    load_layer, load_plots, load_road_network, parse_layer, parse_plots, parse_road_network,
};
pub use output::{
    GfaResultRow, read_gfa_results, write_csv, write_gfa_results, write_quality_report,
};
pub use table::{parse_table, read_table};

/// Errors that prevent an input from being loaded or an output written.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A GeoJSON document could not be parsed.
    #[error("Invalid GeoJSON in {source_name}: {source}")]
    GeoJson {
        /// File or label of the document.
        source_name: String,
        /// Parser error.
        source: Box<geojson::Error>,
    },

    /// A GeoJSON document is not a `FeatureCollection`.
    #[error("{0} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection(String),

    /// CSV read or write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The table is structurally unusable.
    #[error(transparent)]
    Table(#[from] plot_gfa_regulation::RegulationError),

    /// A result row holds a value that cannot be interpreted.
    #[error("Invalid result row for plot '{plot}': {message}")]
    InvalidRow {
        /// Plot id of the row.
        plot: String,
        /// Description of the problem.
        message: String,
    },
}

pub(crate) fn read_text(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IngestError + '_ {
    move |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    }
}
