#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality dispersion forecasting.
//!
//! [`forecast::simulate`] projects a current [`PollutantReading`] forward
//! hour by hour using rain washout and wind dispersion from an hourly
//! weather forecast, then [`window`] picks the cleanest window and the worst
//! hour. [`service::DispersionService`] fetches the forecast and the
//! current reading concurrently before running the pure computation.
//!
//! [`PollutantReading`]: citypulse_air_quality_models::PollutantReading

pub mod forecast;
pub mod open_meteo;
pub mod reading;
pub mod service;
pub mod weather;
pub mod window;

use citypulse_spatial::InvalidCoordinateError;
use thiserror::Error;

/// Errors surfaced by the dispersion forecaster.
///
/// Missing forecast hours and failed weather lookups are not errors; they
/// degrade the result instead.
#[derive(Debug, Error)]
pub enum AirQualityError {
    /// The caller supplied an unusable location or reading.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// No current reading could be obtained to anchor the series.
    #[error("No current air-quality reading near {location}: {reason}")]
    NoCurrentReading {
        /// The requested location.
        location: String,
        /// Why the lookup produced nothing.
        reason: String,
    },
}

impl From<InvalidCoordinateError> for AirQualityError {
    fn from(e: InvalidCoordinateError) -> Self {
        Self::InvalidInput {
            message: e.to_string(),
        }
    }
}
