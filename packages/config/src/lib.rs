#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tunable parameters for the analytics core.
//!
//! Every numeric knob the forecasting, event-impact, and routing code
//! consults lives in [`AnalyticsConfig`]. The compiled-in defaults mirror
//! `config/default.toml`, which is embedded at compile time. Deployments
//! override any subset by pointing `CITYPULSE_CONFIG` at a TOML file.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an override config file.
pub const CONFIG_ENV_VAR: &str = "CITYPULSE_CONFIG";

/// Longest dispersion horizon accepted; Open-Meteo serves 16 days of hours.
pub const MAX_HORIZON_HOURS: u32 = 384;

/// The default configuration file, embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`AnalyticsConfig`].
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is outside its permitted range.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Which value is wrong and why.
        message: String,
    },
}

/// Root of the analytics configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Air-quality dispersion forecasting.
    pub dispersion: DispersionConfig,
    /// Best-window selection over a prediction series.
    pub window: WindowConfig,
    /// Event discovery, filtering, and camera mapping.
    pub events: EventsConfig,
    /// Congestion risk scoring.
    pub risk: RiskConfig,
    /// Mitigation plan costing.
    pub actions: ActionsConfig,
    /// Route benchmarking and the internal road model.
    pub routing: RoutingConfig,
    /// Outbound provider retry and credential rotation.
    pub providers: ProvidersConfig,
}

impl AnalyticsConfig {
    /// Parses a (possibly partial) TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value fails
    /// [`Self::validate`].
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or the embedded defaults
    /// when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the named file cannot be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => {
                log::info!("Loading analytics config from {path}");
                Self::from_path(Path::new(&path))
            }
            _ => {
                log::debug!("{CONFIG_ENV_VAR} not set, using embedded defaults");
                Self::from_toml_str(DEFAULT_CONFIG_TOML)
            }
        }
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispersion.validate()?;
        if self.window.min_window_hours == 0 {
            return Err(invalid("window.min_window_hours must be at least 1"));
        }
        self.events.validate()?;
        self.risk.validate()?;
        self.routing.validate()?;
        if self.providers.max_attempts == 0 {
            return Err(invalid("providers.max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Serializes the effective configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

// ── Dispersion ───────────────────────────────────────────────────────────

/// Upper bounds (inclusive) of each AQI category. Anything above
/// `very_unhealthy` is hazardous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AqiBreakpoints {
    /// Upper bound of "good".
    pub good: f64,
    /// Upper bound of "moderate".
    pub moderate: f64,
    /// Upper bound of "unhealthy for sensitive groups".
    pub unhealthy_for_sensitive: f64,
    /// Upper bound of "unhealthy".
    pub unhealthy: f64,
    /// Upper bound of "very unhealthy".
    pub very_unhealthy: f64,
}

impl Default for AqiBreakpoints {
    fn default() -> Self {
        Self {
            good: 50.0,
            moderate: 100.0,
            unhealthy_for_sensitive: 150.0,
            unhealthy: 200.0,
            very_unhealthy: 300.0,
        }
    }
}

impl AqiBreakpoints {
    const fn as_array(&self) -> [f64; 5] {
        [
            self.good,
            self.moderate,
            self.unhealthy_for_sensitive,
            self.unhealthy,
            self.very_unhealthy,
        ]
    }
}

/// Parameters of the hour-by-hour dispersion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionConfig {
    /// Number of predictions produced, including the anchor hour.
    pub horizon_hours: u32,
    /// Lowest valid AQI.
    pub aqi_min: f64,
    /// Highest valid AQI.
    pub aqi_max: f64,
    /// Fractional AQI reduction per mm/h of precipitation.
    pub rain_washout_per_mm: f64,
    /// Cap on the rain-washout reduction.
    pub rain_washout_max: f64,
    /// Wind speed below which no dispersion is applied.
    pub wind_threshold_kmh: f64,
    /// Fractional AQI reduction per km/h above the threshold.
    pub wind_dispersion_per_kmh: f64,
    /// Cap on the wind-dispersion reduction.
    pub wind_dispersion_max: f64,
    /// Confidence of the anchor hour.
    pub initial_confidence: f64,
    /// Multiplicative confidence decay per hour.
    pub confidence_decay: f64,
    /// Extra multiplicative penalty for an hour with no forecast data.
    pub missing_hour_penalty: f64,
    /// Timeout for the weather forecast lookup.
    pub forecast_timeout_ms: u64,
    /// Timeout for the current reading lookup.
    pub reading_timeout_ms: u64,
    /// Stations farther than this from the requested location are ignored.
    pub station_radius_km: f64,
    /// Category breakpoints.
    pub breakpoints: AqiBreakpoints,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 12,
            aqi_min: 0.0,
            aqi_max: 500.0,
            rain_washout_per_mm: 0.08,
            rain_washout_max: 0.4,
            wind_threshold_kmh: 10.0,
            wind_dispersion_per_kmh: 0.01,
            wind_dispersion_max: 0.3,
            initial_confidence: 0.95,
            confidence_decay: 0.95,
            missing_hour_penalty: 0.8,
            forecast_timeout_ms: 5000,
            reading_timeout_ms: 5000,
            station_radius_km: 10.0,
            breakpoints: AqiBreakpoints::default(),
        }
    }
}

impl DispersionConfig {
    /// Forecast lookup timeout as a [`Duration`].
    #[must_use]
    pub const fn forecast_timeout(&self) -> Duration {
        Duration::from_millis(self.forecast_timeout_ms)
    }

    /// Current reading lookup timeout as a [`Duration`].
    #[must_use]
    pub const fn reading_timeout(&self) -> Duration {
        Duration::from_millis(self.reading_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_hours == 0 || self.horizon_hours > MAX_HORIZON_HOURS {
            return Err(invalid(format!(
                "dispersion.horizon_hours must be between 1 and {MAX_HORIZON_HOURS}, got {}",
                self.horizon_hours
            )));
        }
        if !(self.aqi_min.is_finite() && self.aqi_max.is_finite() && self.aqi_min < self.aqi_max)
        {
            return Err(invalid("dispersion.aqi_min must be below dispersion.aqi_max"));
        }
        let bounds = self.breakpoints.as_array();
        if bounds.windows(2).any(|w| w[0] >= w[1]) || bounds.iter().any(|b| !b.is_finite()) {
            return Err(invalid("dispersion.breakpoints must be strictly ascending"));
        }
        check_positive("dispersion.station_radius_km", self.station_radius_km)?;
        check_fraction("dispersion.rain_washout_max", self.rain_washout_max)?;
        check_fraction("dispersion.wind_dispersion_max", self.wind_dispersion_max)?;
        check_fraction("dispersion.initial_confidence", self.initial_confidence)?;
        check_fraction("dispersion.confidence_decay", self.confidence_decay)?;
        check_fraction("dispersion.missing_hour_penalty", self.missing_hour_penalty)?;
        if self.rain_washout_per_mm < 0.0 || self.wind_dispersion_per_kmh < 0.0 {
            return Err(invalid("dispersion attenuation rates must not be negative"));
        }
        Ok(())
    }
}

// ── Window ───────────────────────────────────────────────────────────────

/// Best-window selection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Shortest window the selector may return.
    pub min_window_hours: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_window_hours: 2,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────────────

/// Event discovery and camera mapping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Human-readable area name used in search queries.
    pub area_name: String,
    /// ISO 3166-1 alpha-2 country code for holiday calendars.
    pub country_code: String,
    /// Offset of the area's local time from UTC, for sources that report
    /// local dates and times.
    pub utc_offset_minutes: i32,
    /// Events below this expected attendance are dropped.
    pub min_expected_attendees: u32,
    /// Radius around the area center searched by directories.
    pub search_radius_km: f64,
    /// Default discovery horizon.
    pub lookahead_hours: u32,
    /// Cameras farther than this from a venue are not affected.
    pub mapping_radius_km: f64,
    /// Start-time tolerance when matching duplicates.
    pub dedup_time_tolerance_minutes: i64,
    /// Venues closer than this are treated as the same venue.
    pub dedup_venue_distance_km: f64,
    /// Timeout for a directory without its own setting.
    pub default_source_timeout_ms: u64,
    /// Attendance assumed for a citywide public holiday.
    pub holiday_attendance: u32,
    /// Attendance assumed per category when a source reports none.
    pub category_attendance: BTreeMap<String, u32>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            area_name: "Ho Chi Minh City".to_string(),
            country_code: "VN".to_string(),
            utc_offset_minutes: 420,
            min_expected_attendees: 5000,
            search_radius_km: 25.0,
            lookahead_hours: 72,
            mapping_radius_km: 2.0,
            dedup_time_tolerance_minutes: 90,
            dedup_venue_distance_km: 0.3,
            default_source_timeout_ms: 8000,
            holiday_attendance: 50_000,
            category_attendance: [
                ("sports", 30_000),
                ("concert", 15_000),
                ("festival", 20_000),
                ("conference", 3_000),
                ("holiday", 50_000),
                ("community", 2_000),
                ("other", 1_000),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }
}

impl EventsConfig {
    /// Attendance estimate for `category`, falling back to `other`.
    #[must_use]
    pub fn attendance_estimate(&self, category: &str) -> Option<u32> {
        self.category_attendance
            .get(category)
            .or_else(|| self.category_attendance.get("other"))
            .copied()
    }

    /// Default per-directory timeout as a [`Duration`].
    #[must_use]
    pub const fn default_source_timeout(&self) -> Duration {
        Duration::from_millis(self.default_source_timeout_ms)
    }

    /// The area's UTC offset, or UTC if the configured offset is out of
    /// range.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("events.mapping_radius_km", self.mapping_radius_km)?;
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(invalid("events.utc_offset_minutes must be within ±1439"));
        }
        check_positive("events.search_radius_km", self.search_radius_km)?;
        if !self.dedup_venue_distance_km.is_finite() || self.dedup_venue_distance_km < 0.0 {
            return Err(invalid("events.dedup_venue_distance_km must not be negative"));
        }
        if self.dedup_time_tolerance_minutes < 0 {
            return Err(invalid(
                "events.dedup_time_tolerance_minutes must not be negative",
            ));
        }
        Ok(())
    }
}

// ── Risk ─────────────────────────────────────────────────────────────────

/// Weights of the four risk sub-scores. Must sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of log-scaled attendance.
    pub attendance: f64,
    /// Weight of time-to-event proximity.
    pub proximity: f64,
    /// Weight of the current congestion baseline.
    pub congestion: f64,
    /// Weight of the historical category impact.
    pub historical: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            attendance: 0.4,
            proximity: 0.25,
            congestion: 0.1,
            historical: 0.25,
        }
    }
}

impl RiskWeights {
    /// Sum of all four weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.attendance + self.proximity + self.congestion + self.historical
    }
}

/// Lower bounds (inclusive) of the medium, high, and critical tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Scores at or above this are at least medium.
    pub medium: f64,
    /// Scores at or above this are at least high.
    pub high: f64,
    /// Scores at or above this are critical.
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 30.0,
            high: 60.0,
            critical: 85.0,
        }
    }
}

/// Congestion risk scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Attendance at which the attendance sub-score saturates at 1.
    pub attendance_saturation: u32,
    /// Hours before the start at which proximity begins to rise from 0.
    pub proximity_horizon_hours: f64,
    /// Assumed duration of an event that reports no end time.
    pub default_event_duration_hours: f64,
    /// Coefficient for categories absent from `historical_impact`.
    pub default_historical_impact: f64,
    /// Timeout for a congestion lookup.
    pub congestion_timeout_ms: u64,
    /// Historical impact coefficient per event category.
    pub historical_impact: BTreeMap<String, f64>,
    /// Sub-score weights.
    pub weights: RiskWeights,
    /// Tier thresholds.
    pub thresholds: RiskThresholds,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            attendance_saturation: 50_000,
            proximity_horizon_hours: 24.0,
            default_event_duration_hours: 3.0,
            default_historical_impact: 0.3,
            congestion_timeout_ms: 3000,
            historical_impact: [
                ("sports", 0.9),
                ("concert", 0.8),
                ("festival", 0.85),
                ("conference", 0.4),
                ("holiday", 0.6),
                ("community", 0.3),
                ("other", 0.3),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
        }
    }
}

impl RiskConfig {
    /// Historical impact coefficient for `category`.
    #[must_use]
    pub fn historical_impact_for(&self, category: &str) -> f64 {
        self.historical_impact
            .get(category)
            .copied()
            .unwrap_or(self.default_historical_impact)
    }

    /// Congestion lookup timeout as a [`Duration`].
    #[must_use]
    pub const fn congestion_timeout(&self) -> Duration {
        Duration::from_millis(self.congestion_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (name, value) in [
            ("risk.weights.attendance", w.attendance),
            ("risk.weights.proximity", w.proximity),
            ("risk.weights.congestion", w.congestion),
            ("risk.weights.historical", w.historical),
        ] {
            check_fraction(name, value)?;
        }
        if (w.total() - 1.0).abs() > 1e-6 {
            return Err(invalid(format!(
                "risk.weights must sum to 1, got {}",
                w.total()
            )));
        }
        let t = &self.thresholds;
        if !(0.0 < t.medium && t.medium < t.high && t.high < t.critical && t.critical <= 100.0) {
            return Err(invalid(
                "risk.thresholds must satisfy 0 < medium < high < critical <= 100",
            ));
        }
        if self.attendance_saturation == 0 {
            return Err(invalid("risk.attendance_saturation must be positive"));
        }
        check_positive(
            "risk.proximity_horizon_hours",
            self.proximity_horizon_hours,
        )?;
        check_positive(
            "risk.default_event_duration_hours",
            self.default_event_duration_hours,
        )?;
        check_fraction(
            "risk.default_historical_impact",
            self.default_historical_impact,
        )?;
        for (category, value) in &self.historical_impact {
            check_fraction(&format!("risk.historical_impact.{category}"), *value)?;
        }
        Ok(())
    }
}

// ── Actions ──────────────────────────────────────────────────────────────

/// Cost model for mitigation plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Fixed cost of a critical-tier deployment.
    pub critical_base_cost: f64,
    /// Fixed cost of high-tier alternate-route signaling.
    pub high_base_cost: f64,
    /// Fixed cost of medium-tier monitoring.
    pub medium_base_cost: f64,
    /// Added cost per targeted camera.
    pub per_camera_cost: f64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            critical_base_cost: 5000.0,
            high_base_cost: 1500.0,
            medium_base_cost: 200.0,
            per_camera_cost: 150.0,
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────────

/// Route benchmark and internal road model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Gaps within ± this percentage are reported as comparable.
    pub comparable_gap_percent: f64,
    /// Timeout for the external routing call.
    pub external_timeout_ms: u64,
    /// Speed of the legs joining endpoints to the nearest road node.
    pub access_speed_kmh: f64,
    /// Speed used when no network path exists.
    pub fallback_speed_kmh: f64,
    /// Straight-line to road distance multiplier for the fallback.
    pub detour_factor: f64,
    /// Fraction of free-flow speed lost at full congestion.
    pub congestion_slowdown: f64,
    /// Endpoints farther than this from any node use the fallback.
    pub max_snap_distance_km: f64,
    /// Optional TOML file describing the internal road network.
    pub network_path: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            comparable_gap_percent: 10.0,
            external_timeout_ms: 8000,
            access_speed_kmh: 20.0,
            fallback_speed_kmh: 30.0,
            detour_factor: 1.3,
            congestion_slowdown: 0.7,
            max_snap_distance_km: 2.0,
            network_path: None,
        }
    }
}

impl RoutingConfig {
    /// External routing timeout as a [`Duration`].
    #[must_use]
    pub const fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("routing.access_speed_kmh", self.access_speed_kmh)?;
        check_positive("routing.fallback_speed_kmh", self.fallback_speed_kmh)?;
        check_positive("routing.max_snap_distance_km", self.max_snap_distance_km)?;
        if !(self.detour_factor.is_finite() && self.detour_factor >= 1.0) {
            return Err(invalid("routing.detour_factor must be at least 1"));
        }
        // A slowdown of exactly 1 would make fully congested segments impassable.
        if !(self.congestion_slowdown.is_finite() && (0.0..1.0).contains(&self.congestion_slowdown))
        {
            return Err(invalid("routing.congestion_slowdown must be within [0, 1)"));
        }
        if !(self.comparable_gap_percent.is_finite() && self.comparable_gap_percent >= 0.0) {
            return Err(invalid("routing.comparable_gap_percent must not be negative"));
        }
        Ok(())
    }
}

// ── Providers ────────────────────────────────────────────────────────────

/// Retry and credential rotation policy for outbound provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Total attempts per logical request, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on each retry.
    pub base_backoff_ms: u64,
    /// Upper bound on a single backoff.
    pub max_backoff_ms: u64,
    /// How long a rate-limited credential is skipped.
    pub credential_cooldown_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 500,
            max_backoff_ms: 8000,
            credential_cooldown_secs: 60,
        }
    }
}

impl ProvidersConfig {
    /// Backoff before retry number `attempt` (1-based), capped at
    /// `max_backoff_ms`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self.base_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }

    /// Credential cooldown as a [`Duration`].
    #[must_use]
    pub const fn credential_cooldown(&self) -> Duration {
        Duration::from_secs(self.credential_cooldown_secs)
    }
}
