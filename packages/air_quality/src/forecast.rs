//! Hour-by-hour dispersion model.
//!
//! Hour 0 is the current reading. Each later hour starts from the previous
//! prediction and removes two bounded fractions:
//!
//! * rain washout: `min(precipitation_mm × rain_washout_per_mm, rain_washout_max)`
//! * wind dispersion: `min(max(wind − threshold, 0) × wind_dispersion_per_kmh, wind_dispersion_max)`
//!
//! giving `aqi[i] = clamp(aqi[i-1] × (1 − rain) × (1 − wind))`. Confidence
//! is multiplied by `confidence_decay` every hour and additionally by
//! `missing_hour_penalty` when the forecast has no usable data for the
//! hour, in which case the previous prediction is carried forward.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use citypulse_air_quality_models::{
    AqiCategory, DispersionSimulation, HourlyPrediction, HourlyWeather, PollutantReading,
    PredictionFactors,
};
use citypulse_config::{AnalyticsConfig, AqiBreakpoints, DispersionConfig};
use citypulse_spatial::Location;

use crate::AirQualityError;
use crate::window::select_windows;

/// Classifies an AQI value using inclusive upper bounds.
#[must_use]
pub fn category_for(aqi: f64, breakpoints: &AqiBreakpoints) -> AqiCategory {
    if aqi <= breakpoints.good {
        AqiCategory::Good
    } else if aqi <= breakpoints.moderate {
        AqiCategory::Moderate
    } else if aqi <= breakpoints.unhealthy_for_sensitive {
        AqiCategory::UnhealthyForSensitive
    } else if aqi <= breakpoints.unhealthy {
        AqiCategory::Unhealthy
    } else if aqi <= breakpoints.very_unhealthy {
        AqiCategory::VeryUnhealthy
    } else {
        AqiCategory::Hazardous
    }
}

/// Fraction of AQI removed by `precipitation_mm` of rain in one hour.
#[must_use]
pub fn rain_washout(precipitation_mm: f64, config: &DispersionConfig) -> f64 {
    (precipitation_mm.max(0.0) * config.rain_washout_per_mm).min(config.rain_washout_max)
}

/// Fraction of AQI removed by wind at `wind_speed_kmh`.
#[must_use]
pub fn wind_dispersion(wind_speed_kmh: f64, config: &DispersionConfig) -> f64 {
    ((wind_speed_kmh - config.wind_threshold_kmh).max(0.0) * config.wind_dispersion_per_kmh)
        .min(config.wind_dispersion_max)
}

/// Truncates a timestamp to the start of its hour.
#[must_use]
pub fn start_of_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Produces `config.horizon_hours` predictions anchored at the reading's
/// hour.
///
/// # Errors
///
/// Returns [`AirQualityError::InvalidInput`] if the location is invalid or
/// the reading's AQI is negative or not finite. Missing forecast data never
/// fails; see the module docs.
pub fn forecast(
    location: Location,
    reading: &PollutantReading,
    weather: &[HourlyWeather],
    config: &DispersionConfig,
) -> Result<Vec<HourlyPrediction>, AirQualityError> {
    location.validate()?;
    if !reading.aqi.is_finite() || reading.aqi < 0.0 {
        return Err(AirQualityError::InvalidInput {
            message: format!("current AQI must be a non-negative number, got {}", reading.aqi),
        });
    }

    let start = start_of_hour(reading.observed_at);
    let by_hour: BTreeMap<DateTime<Utc>, &HourlyWeather> = weather
        .iter()
        .map(|hour| (start_of_hour(hour.time), hour))
        .collect();

    let horizon = usize::try_from(config.horizon_hours).unwrap_or(usize::MAX);
    let mut predictions: Vec<HourlyPrediction> = Vec::with_capacity(horizon);

    let anchor_aqi = reading.aqi.clamp(config.aqi_min, config.aqi_max);
    predictions.push(HourlyPrediction {
        timestamp: start,
        predicted_aqi: anchor_aqi,
        predicted_pm25: reading.pm25.filter(|v| v.is_finite()),
        aqi_category: category_for(anchor_aqi, &config.breakpoints),
        confidence: config.initial_confidence,
        factors: PredictionFactors::default(),
        degraded: false,
    });

    for offset in 1..horizon {
        let previous = &predictions[offset - 1];
        let timestamp = start + TimeDelta::hours(i64::try_from(offset).unwrap_or(i64::MAX));

        let conditions = by_hour.get(&timestamp).and_then(|hour| usable_conditions(hour));

        let next = match conditions {
            Some((precipitation_mm, wind_speed_kmh)) => {
                let factors = PredictionFactors {
                    rain_washout: rain_washout(precipitation_mm, config),
                    wind_dispersion: wind_dispersion(wind_speed_kmh, config),
                };
                let retained = (1.0 - factors.rain_washout) * (1.0 - factors.wind_dispersion);
                let aqi = (previous.predicted_aqi * retained).clamp(config.aqi_min, config.aqi_max);
                HourlyPrediction {
                    timestamp,
                    predicted_aqi: aqi,
                    predicted_pm25: previous.predicted_pm25.map(|pm| (pm * retained).max(0.0)),
                    aqi_category: category_for(aqi, &config.breakpoints),
                    confidence: previous.confidence * config.confidence_decay,
                    factors,
                    degraded: false,
                }
            }
            None => {
                log::debug!("No usable forecast for {timestamp}, carrying previous hour forward");
                HourlyPrediction {
                    timestamp,
                    predicted_aqi: previous.predicted_aqi,
                    predicted_pm25: previous.predicted_pm25,
                    aqi_category: previous.aqi_category,
                    confidence: previous.confidence
                        * config.confidence_decay
                        * config.missing_hour_penalty,
                    factors: PredictionFactors::default(),
                    degraded: true,
                }
            }
        };
        predictions.push(next);
    }

    Ok(predictions)
}

/// Runs [`forecast`] and the window selector, producing a full simulation.
///
/// # Errors
///
/// See [`forecast`].
pub fn simulate(
    location: Location,
    reading: &PollutantReading,
    weather: &[HourlyWeather],
    config: &AnalyticsConfig,
) -> Result<DispersionSimulation, AirQualityError> {
    let predictions = forecast(location, reading, weather, &config.dispersion)?;
    let selection = select_windows(&predictions, config.window.min_window_hours);
    let degraded_hours = predictions.iter().filter(|p| p.degraded).count();

    if degraded_hours > 0 {
        log::warn!(
            "Dispersion forecast at {location} degraded: {degraded_hours} of {} hours had no forecast data",
            predictions.len()
        );
    }

    Ok(DispersionSimulation {
        location,
        current_aqi: reading.aqi,
        predictions,
        peak_pollution: selection.peak,
        best_window: selection.best_window,
        degraded_hours: u32::try_from(degraded_hours).unwrap_or(u32::MAX),
    })
}

/// Precipitation and wind for an hour, if both are present and finite.
fn usable_conditions(hour: &HourlyWeather) -> Option<(f64, f64)> {
    let precipitation = hour.precipitation_mm.filter(|v| v.is_finite())?;
    let wind = hour.wind_speed_kmh.filter(|v| v.is_finite())?;
    Some((precipitation, wind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn reading(aqi: f64) -> PollutantReading {
        PollutantReading {
            aqi,
            pm25: Some(60.0),
            pm10: None,
            no2: None,
            o3: None,
            co: None,
            so2: None,
            observed_at: start() + TimeDelta::minutes(17),
        }
    }

    fn flat_forecast(hours: i64, precipitation: f64, wind: f64) -> Vec<HourlyWeather> {
        (0..hours)
            .map(|i| HourlyWeather {
                time: start() + TimeDelta::hours(i),
                temperature_c: Some(30.0),
                humidity_pct: Some(70.0),
                wind_speed_kmh: Some(wind),
                precipitation_mm: Some(precipitation),
            })
            .collect()
    }

    fn location() -> Location {
        Location::new(10.7769, 106.7009)
    }

    #[test]
    fn calm_dry_forecast_holds_aqi_and_only_decays_confidence() {
        let config = DispersionConfig::default();
        let predictions =
            forecast(location(), &reading(150.0), &flat_forecast(24, 0.0, 0.0), &config).unwrap();

        assert_eq!(predictions.len(), 12);
        for p in &predictions {
            assert!((p.predicted_aqi - 150.0).abs() < 1e-9);
            assert_eq!(p.aqi_category, AqiCategory::UnhealthyForSensitive);
            assert!(!p.degraded);
        }
        assert!(predictions[11].confidence < predictions[0].confidence);
    }

    #[test]
    fn timestamps_step_hourly_from_the_reading_hour() {
        let config = DispersionConfig::default();
        let predictions =
            forecast(location(), &reading(80.0), &flat_forecast(24, 1.0, 15.0), &config).unwrap();
        for (i, p) in predictions.iter().enumerate() {
            assert_eq!(p.timestamp, start() + TimeDelta::hours(i64::try_from(i).unwrap()));
        }
    }

    #[test]
    fn confidence_never_increases() {
        let config = DispersionConfig::default();
        let mut weather = flat_forecast(24, 2.0, 20.0);
        weather.retain(|h| h.time != start() + TimeDelta::hours(4));
        weather[6].wind_speed_kmh = None;

        let predictions = forecast(location(), &reading(120.0), &weather, &config).unwrap();
        for pair in predictions.windows(2) {
            assert!(pair[1].confidence <= pair[0].confidence);
        }
    }

    #[test]
    fn rain_and_wind_reduce_aqi_within_caps() {
        let config = DispersionConfig::default();
        let predictions =
            forecast(location(), &reading(200.0), &flat_forecast(24, 100.0, 200.0), &config)
                .unwrap();
        let first = &predictions[1];
        assert!((first.factors.rain_washout - config.rain_washout_max).abs() < 1e-12);
        assert!((first.factors.wind_dispersion - config.wind_dispersion_max).abs() < 1e-12);
        let expected = 200.0 * (1.0 - 0.4) * (1.0 - 0.3);
        assert!((first.predicted_aqi - expected).abs() < 1e-9);
        assert!(first.predicted_pm25.unwrap() < 60.0);
    }

    #[test]
    fn light_wind_below_threshold_has_no_effect() {
        let config = DispersionConfig::default();
        assert!(wind_dispersion(config.wind_threshold_kmh - 1.0, &config).abs() < f64::EPSILON);
        assert!((wind_dispersion(config.wind_threshold_kmh + 5.0, &config) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn missing_hours_carry_forward_with_penalty() {
        let config = DispersionConfig::default();
        let predictions = forecast(location(), &reading(90.0), &[], &config).unwrap();
        assert_eq!(predictions.len(), 12);
        assert!(predictions[1..].iter().all(|p| p.degraded));
        assert!(predictions.iter().all(|p| (p.predicted_aqi - 90.0).abs() < 1e-9));
        let expected = config.initial_confidence * config.confidence_decay * config.missing_hour_penalty;
        assert!((predictions[1].confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_reading_is_clamped() {
        let config = DispersionConfig::default();
        let predictions =
            forecast(location(), &reading(900.0), &flat_forecast(24, 0.0, 0.0), &config).unwrap();
        assert!((predictions[0].predicted_aqi - config.aqi_max).abs() < f64::EPSILON);
        assert_eq!(predictions[0].aqi_category, AqiCategory::Hazardous);
    }

    #[test]
    fn rejects_invalid_input() {
        let config = DispersionConfig::default();
        assert!(matches!(
            forecast(Location::new(120.0, 0.0), &reading(50.0), &[], &config),
            Err(AirQualityError::InvalidInput { .. })
        ));
        assert!(matches!(
            forecast(location(), &reading(f64::NAN), &[], &config),
            Err(AirQualityError::InvalidInput { .. })
        ));
    }

    #[test]
    fn categories_follow_breakpoints() {
        let bp = AqiBreakpoints::default();
        let table = [
            (0.0, AqiCategory::Good),
            (50.0, AqiCategory::Good),
            (51.0, AqiCategory::Moderate),
            (100.0, AqiCategory::Moderate),
            (101.0, AqiCategory::UnhealthyForSensitive),
            (151.0, AqiCategory::Unhealthy),
            (201.0, AqiCategory::VeryUnhealthy),
            (300.0, AqiCategory::VeryUnhealthy),
            (301.0, AqiCategory::Hazardous),
        ];
        for (aqi, expected) in table {
            assert_eq!(category_for(aqi, &bp), expected, "aqi {aqi}");
        }
    }

    #[test]
    fn every_prediction_category_matches_its_aqi() {
        let config = DispersionConfig::default();
        let predictions =
            forecast(location(), &reading(320.0), &flat_forecast(24, 3.0, 25.0), &config).unwrap();
        for p in &predictions {
            assert_eq!(p.aqi_category, category_for(p.predicted_aqi, &config.breakpoints));
        }
    }

    #[test]
    fn simulation_reports_degraded_hours_and_windows() {
        let config = AnalyticsConfig::default();
        let mut weather = flat_forecast(24, 4.0, 12.0);
        weather.retain(|h| h.time != start() + TimeDelta::hours(3));
        let simulation = simulate(location(), &reading(140.0), &weather, &config).unwrap();

        assert_eq!(simulation.degraded_hours, 1);
        assert!((simulation.current_aqi - 140.0).abs() < f64::EPSILON);
        let peak = simulation.peak_pollution.unwrap();
        assert_eq!(peak.index, 0);
        let window = simulation.best_window.unwrap();
        assert!(window.hours >= config.window.min_window_hours);
    }
}
