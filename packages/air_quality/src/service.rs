//! Orchestrates the forecaster with its weather and reading sources.

use std::sync::Arc;

use citypulse_air_quality_models::DispersionSimulation;
use citypulse_config::AnalyticsConfig;
use citypulse_provider::with_timeout;
use citypulse_spatial::Location;

use crate::AirQualityError;
use crate::forecast::simulate;
use crate::reading::CurrentReadingSource;
use crate::weather::WeatherForecastClient;

/// Fetches inputs concurrently and runs the dispersion simulation.
///
/// A failed or slow weather forecast degrades every hour after the anchor
/// instead of failing. A missing current reading fails the request with
/// [`AirQualityError::NoCurrentReading`] because there is nothing to anchor
/// the series to.
pub struct DispersionService {
    weather: Arc<dyn WeatherForecastClient>,
    readings: Arc<dyn CurrentReadingSource>,
    config: Arc<AnalyticsConfig>,
}

impl DispersionService {
    #[must_use]
    pub fn new(
        weather: Arc<dyn WeatherForecastClient>,
        readings: Arc<dyn CurrentReadingSource>,
        config: Arc<AnalyticsConfig>,
    ) -> Self {
        Self {
            weather,
            readings,
            config,
        }
    }

    /// Produces a [`DispersionSimulation`] for `location`.
    ///
    /// # Errors
    ///
    /// Returns [`AirQualityError::InvalidInput`] for an invalid location or
    /// reading, and [`AirQualityError::NoCurrentReading`] when no reading
    /// is available.
    pub async fn simulate(&self, location: Location) -> Result<DispersionSimulation, AirQualityError> {
        location.validate()?;
        let dispersion = &self.config.dispersion;

        let (forecast, reading) = tokio::join!(
            with_timeout(
                self.weather.id(),
                dispersion.forecast_timeout(),
                self.weather.hourly_forecast(location, dispersion.horizon_hours),
            ),
            with_timeout(
                self.readings.id(),
                dispersion.reading_timeout(),
                self.readings.current_reading(location),
            ),
        );

        let forecast = forecast.unwrap_or_else(|e| {
            log::warn!(
                "Weather forecast from {} failed, all hours will be degraded: {e}",
                self.weather.id()
            );
            Vec::new()
        });

        let reading = match reading {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                return Err(AirQualityError::NoCurrentReading {
                    location: location.to_string(),
                    reason: format!("{} reported no station nearby", self.readings.id()),
                });
            }
            Err(e) => {
                log::warn!("Current reading from {} failed: {e}", self.readings.id());
                return Err(AirQualityError::NoCurrentReading {
                    location: location.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        simulate(location, &reading, &forecast, &self.config)
    }
}
