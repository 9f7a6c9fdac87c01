#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only NGSI-LD context broker adapter.
//!
//! The platform's live sensor state lives in a context broker. This crate
//! queries `/ngsi-ld/v1/entities` with `options=keyValues` and serves it
//! through the analytics seams:
//!
//! * `Camera` entities back
//!   [`CameraDirectory`](citypulse_events::analyze::CameraDirectory) and,
//!   through their `congestionLevel`,
//!   [`CongestionSource`](citypulse_events::analyze::CongestionSource).
//! * `AirQualityObserved` entities back
//!   [`CurrentReadingSource`](citypulse_air_quality::reading::CurrentReadingSource).
//!
//! It never writes to the broker.

pub mod client;
pub mod parse;

use citypulse_air_quality::reading::ReadingError;
use citypulse_events::analyze::SensorError;
use citypulse_provider::ProviderError;
use thiserror::Error;

/// Env var naming the broker's base URL.
pub const BROKER_URL_ENV: &str = "CONTEXT_BROKER_URL";

/// Errors from context broker queries.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport, status, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The broker returned something other than an entity array.
    #[error("Context broker parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

impl From<BrokerError> for SensorError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Provider(e) => Self::Provider(e),
            BrokerError::Parse { message } => Self::Parse { message },
        }
    }
}

impl From<BrokerError> for ReadingError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Provider(e) => Self::Provider(e),
            BrokerError::Parse { message } => Self::Parse { message },
        }
    }
}
