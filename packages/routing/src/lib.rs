#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route efficiency benchmark.
//!
//! [`benchmark::RouteBenchmarker`] asks an external [`provider::RoutingProvider`]
//! for a route and compares it with the platform's own estimate over a
//! [`network::RoadNetwork`].

pub mod benchmark;
pub mod google;
pub mod network;
pub mod provider;

use citypulse_spatial::InvalidCoordinateError;
use thiserror::Error;

/// Errors surfaced by the routing crate.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Origin or destination is not a usable coordinate.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// The external estimate could not be obtained, so no comparison is
    /// possible.
    #[error("Route benchmark unavailable ({provider}): {reason}")]
    BenchmarkUnavailable {
        /// External provider identifier.
        provider: String,
        /// Why the external estimate is missing.
        reason: String,
    },

    /// The road network definition is inconsistent.
    #[error("Invalid road network: {message}")]
    Network {
        /// Description of the problem.
        message: String,
    },

    /// Failed to read a road network file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a road network file.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<InvalidCoordinateError> for RoutingError {
    fn from(e: InvalidCoordinateError) -> Self {
        Self::InvalidInput {
            message: e.to_string(),
        }
    }
}
