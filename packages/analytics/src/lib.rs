#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Summary tables over pipeline outputs.
//!
//! Each function in [`reports`] turns in-memory pipeline values into rows
//! ready for CSV export. Every row carries the generation timestamp so
//! exported tables can be matched to the run that produced them.

pub mod reports;

pub use reports::{
    GfaOverviewRow, RegulationOverviewRow, ScenarioMetricRow, gfa_overview, regulation_overview,
    scenario_difference,
};
