//! Hourly weather forecast collaborator.

use async_trait::async_trait;
use citypulse_air_quality_models::HourlyWeather;
use citypulse_provider::ProviderError;
use citypulse_spatial::Location;
use thiserror::Error;

/// Errors from a weather forecast provider.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Transport, status, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The response did not have the expected shape.
    #[error("Weather response parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

/// Source of hourly weather forecasts.
#[async_trait]
pub trait WeatherForecastClient: Send + Sync {
    /// Short identifier used in logs and timeouts.
    fn id(&self) -> &str;

    /// Fetches `hours` hourly entries starting at the current hour.
    ///
    /// Entries may be missing or have `None` fields; callers treat those
    /// hours as unknown.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError`] if the provider cannot be reached or its
    /// response cannot be parsed.
    async fn hourly_forecast(
        &self,
        location: Location,
        hours: u32,
    ) -> Result<Vec<HourlyWeather>, WeatherError>;
}
