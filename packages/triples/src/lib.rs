#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Linked-data publication of regulations, plot properties and allowable
//! GFAs.
//!
//! [`Emitter`] turns pipeline values into a [`QuadSet`] whose subjects are
//! minted from natural keys, so re-running a command on the same inputs
//! writes a byte-identical N-Quads file and re-uploads the same statements.
//! [`StoreSink`] appends quad sets to a SPARQL store namespace in batches.

pub mod emit;
pub mod quad;
pub mod sink;
pub mod vocab;

pub use emit::Emitter;
pub use quad::{Quad, QuadSet, Term};
pub use sink::{NamespaceStatus, StoreSink};

/// Errors talking to the store.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Request could not be sent or the response not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },
}
