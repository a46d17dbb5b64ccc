#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Allowable gross floor area.
//!
//! [`compute_allowable_gfa`] is a pure function of one plot's constraint
//! bundle and the GFA settings. [`estimate`] applies it to every plot and
//! [`run_scenario`] repeats linking and estimation with one overlay layer
//! substituted. Before estimation, [`apply_context_gprs`] can replace the
//! master plan ratio of institutional plots with one derived from their
//! surroundings. [`residential_types`] lists the residential programmes
//! each plot qualifies for, which widens the plots a type-based
//! regulation applies to.

pub mod context;
pub mod gfa;
pub mod residential;
pub mod scenario;

pub use context::{Surroundings, apply_context_gprs, context_gprs};
pub use gfa::{compute_allowable_gfa, estimate};
pub use residential::{ResidentialFacts, allowed_residential_types, residential_types};
pub use scenario::run_scenario;
