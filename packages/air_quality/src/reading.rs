//! Current pollutant reading collaborator.

use async_trait::async_trait;
use citypulse_air_quality_models::PollutantReading;
use citypulse_provider::ProviderError;
use citypulse_spatial::Location;
use thiserror::Error;

/// Errors from a current-reading source.
#[derive(Debug, Error)]
pub enum ReadingError {
    /// Transport, status, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The source returned data that could not be interpreted.
    #[error("Reading parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

/// Source of the most recent pollutant reading near a location.
#[async_trait]
pub trait CurrentReadingSource: Send + Sync {
    /// Short identifier used in logs and timeouts.
    fn id(&self) -> &str;

    /// Returns the nearest recent reading, or `None` if no station reports
    /// near `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError`] if the source fails.
    async fn current_reading(
        &self,
        location: Location,
    ) -> Result<Option<PollutantReading>, ReadingError>;
}
