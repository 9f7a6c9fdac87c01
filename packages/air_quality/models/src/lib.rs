#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality readings and dispersion forecast types.
//!
//! A [`DispersionSimulation`] is a request-scoped value: it is computed
//! from one [`PollutantReading`] and one hourly weather forecast, returned
//! to the caller, and discarded.

use chrono::{DateTime, Utc};
use citypulse_spatial::Location;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// AQI severity category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AqiCategory {
    /// 0–50
    Good,
    /// 51–100
    Moderate,
    /// 101–150
    UnhealthyForSensitive,
    /// 151–200
    Unhealthy,
    /// 201–300
    VeryUnhealthy,
    /// 301+
    Hazardous,
}

/// A current pollutant observation for one location.
///
/// Only the AQI is required; individual pollutant concentrations are
/// reported when the station measures them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutantReading {
    /// Composite Air Quality Index.
    pub aqi: f64,
    /// PM2.5 concentration (µg/m³).
    pub pm25: Option<f64>,
    /// PM10 concentration (µg/m³).
    pub pm10: Option<f64>,
    /// Nitrogen dioxide (µg/m³).
    pub no2: Option<f64>,
    /// Ozone (µg/m³).
    pub o3: Option<f64>,
    /// Carbon monoxide (µg/m³).
    pub co: Option<f64>,
    /// Sulphur dioxide (µg/m³).
    pub so2: Option<f64>,
    /// When the observation was taken.
    pub observed_at: DateTime<Utc>,
}

/// One hour of a weather forecast. Missing values mark the hour as
/// unusable for attenuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyWeather {
    /// Start of the hour.
    pub time: DateTime<Utc>,
    /// Air temperature at 2 m (°C).
    pub temperature_c: Option<f64>,
    /// Relative humidity at 2 m (%).
    pub humidity_pct: Option<f64>,
    /// Wind speed at 10 m (km/h).
    pub wind_speed_kmh: Option<f64>,
    /// Precipitation over the hour (mm).
    pub precipitation_mm: Option<f64>,
}

/// Attenuation applied to reach an hour's prediction, as fractions of the
/// previous hour's AQI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFactors {
    /// Reduction from precipitation washout.
    pub rain_washout: f64,
    /// Reduction from wind dispersion.
    pub wind_dispersion: f64,
}

/// Predicted air quality for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyPrediction {
    /// Start of the hour.
    pub timestamp: DateTime<Utc>,
    /// Predicted AQI, clamped to the valid range.
    #[serde(rename = "predictedAQI")]
    pub predicted_aqi: f64,
    /// Predicted PM2.5, when the reading included it.
    #[serde(rename = "predictedPM25")]
    pub predicted_pm25: Option<f64>,
    /// Category of `predicted_aqi`.
    pub aqi_category: AqiCategory,
    /// Confidence in `[0, 1]`, non-increasing with the horizon.
    pub confidence: f64,
    /// Attenuation that produced this hour.
    pub factors: PredictionFactors,
    /// `true` when no forecast data existed for this hour and the previous
    /// prediction was carried forward.
    pub degraded: bool,
}

/// The lowest-pollution contiguous window of a prediction series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestWindow {
    /// Start of the first hour in the window.
    pub start: DateTime<Utc>,
    /// End of the last hour in the window (exclusive).
    pub end: DateTime<Utc>,
    /// Index of the first hour in the series.
    pub start_index: usize,
    /// Window length in hours.
    pub hours: usize,
    /// Mean predicted AQI over the window.
    #[serde(rename = "averageAQI")]
    pub average_aqi: f64,
}

/// The single worst hour of a prediction series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHour {
    /// Start of the hour.
    pub timestamp: DateTime<Utc>,
    /// Index in the series.
    pub index: usize,
    /// Predicted AQI at the peak.
    pub aqi: f64,
}

/// An hour-by-hour pollutant projection for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispersionSimulation {
    /// Where the projection applies.
    pub location: Location,
    /// AQI of the anchoring reading.
    #[serde(rename = "currentAQI")]
    pub current_aqi: f64,
    /// Predictions ordered by timestamp, one per hour.
    pub predictions: Vec<HourlyPrediction>,
    /// Highest-AQI hour.
    pub peak_pollution: Option<PeakHour>,
    /// Lowest-average window, if the series is long enough.
    pub best_window: Option<BestWindow>,
    /// Hours predicted without forecast data.
    pub degraded_hours: u32,
}
