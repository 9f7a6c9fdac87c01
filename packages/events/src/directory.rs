//! Event directory abstraction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use citypulse_events_models::{EventCandidate, EventSource};
use citypulse_provider::ProviderError;
use citypulse_spatial::Location;
use thiserror::Error;

use crate::EventError;

/// Errors from a single event directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Transport, status, rate-limit, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The response did not have the expected shape.
    #[error("Directory response parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

/// Where and when to look for events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Center of the search area.
    pub center: Location,
    /// Search radius around `center`.
    pub radius_km: f64,
    /// Start of the horizon (inclusive).
    pub from: DateTime<Utc>,
    /// End of the horizon (inclusive).
    pub to: DateTime<Utc>,
}

impl EventQuery {
    /// Checks the area and horizon.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidInput`] for an invalid center, a
    /// non-positive radius, or a horizon that ends before it starts.
    pub fn validate(&self) -> Result<(), EventError> {
        self.center.validate()?;
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(EventError::InvalidInput {
                message: format!("search radius must be positive, got {}", self.radius_km),
            });
        }
        if self.to < self.from {
            return Err(EventError::InvalidInput {
                message: format!("horizon ends ({}) before it starts ({})", self.to, self.from),
            });
        }
        Ok(())
    }

    /// Returns `true` if an event spanning `start..end` overlaps the
    /// horizon.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        start <= self.to && end.unwrap_or(start) >= self.from
    }
}

/// A source of event listings.
#[async_trait]
pub trait EventDirectory: Send + Sync {
    /// Unique directory identifier, used in logs and skipped-source
    /// reports.
    fn id(&self) -> &str;

    /// What kind of listings this directory produces.
    fn source(&self) -> EventSource;

    /// Per-directory timeout; `None` uses the configured default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Lists events in the query area and horizon.
    ///
    /// Implementations normalize their provider schema into
    /// [`EventCandidate`]s and leave unknown fields empty; validation
    /// happens in the aggregator.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the provider fails.
    async fn search(&self, query: &EventQuery) -> Result<Vec<EventCandidate>, DirectoryError>;
}
