#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Large-event impact analysis.
//!
//! The pipeline, leaves first:
//!
//! 1. [`aggregate`] fans out to every [`directory::EventDirectory`],
//!    validates and deduplicates their listings, and keeps large events.
//! 2. [`mapping`] finds the traffic cameras near each venue.
//! 3. [`risk`] scores congestion risk from attendance, proximity in time,
//!    current congestion, and the category's historical impact.
//! 4. [`action`] turns the risk tier into a mitigation plan.
//!
//! [`analyze::EventImpactAnalyzer`] runs the whole pipeline against live
//! collaborators.

pub mod action;
pub mod aggregate;
pub mod analyze;
pub mod classify;
pub mod directories;
pub mod directory;
pub mod mapping;
pub mod registry;
pub mod risk;

use citypulse_spatial::InvalidCoordinateError;
use thiserror::Error;

/// Errors surfaced by the event pipeline. Individual directory failures
/// are not errors; they are reported as skipped sources.
#[derive(Debug, Error)]
pub enum EventError {
    /// The search area or horizon is unusable.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },
}

impl From<InvalidCoordinateError> for EventError {
    fn from(e: InvalidCoordinateError) -> Self {
        Self::InvalidInput {
            message: e.to_string(),
        }
    }
}
