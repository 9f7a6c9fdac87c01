//! External routing provider seam.

use async_trait::async_trait;
use citypulse_provider::ProviderError;
use citypulse_routing_models::RouteEstimate;
use citypulse_spatial::Location;
use thiserror::Error;

/// Errors from an external routing provider.
#[derive(Debug, Error)]
pub enum RouteProviderError {
    /// Transport, status, rate limit, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider answered but found no route.
    #[error("No route found ({status})")]
    NoRoute {
        /// Provider status string.
        status: String,
    },

    /// The provider returned data that could not be interpreted.
    #[error("Route parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

/// A third-party routing service.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Short identifier used in logs and comparisons.
    fn id(&self) -> &str;

    /// Driving route from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteProviderError`] if the provider fails or finds no
    /// route.
    async fn route(
        &self,
        origin: Location,
        destination: Location,
    ) -> Result<RouteEstimate, RouteProviderError>;
}
