#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Outbound provider plumbing shared by every external adapter.
//!
//! * [`credentials`] holds per-provider API-key pools. Keys are checked out
//!   round-robin, at most one in-flight use per key, and a key that hits a
//!   rate limit cools down before it is handed out again.
//! * [`retry`] wraps `reqwest` sends with exponential backoff and, when a
//!   pool is supplied, rotates to the next key on 429/401/403.

pub mod credentials;
pub mod retry;

use std::time::Duration;

use thiserror::Error;

/// Errors from outbound provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-retryable status.
    #[error("{provider} returned HTTP {status}")]
    Status {
        /// Provider identifier.
        provider: String,
        /// HTTP status code.
        status: u16,
    },

    /// Every attempt was rate limited or refused; retries are exhausted.
    #[error("{provider} rate limited after {attempts} attempts")]
    RateLimited {
        /// Provider identifier.
        provider: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// No API key is configured for the provider.
    #[error("no credentials configured for {provider}")]
    NoCredentials {
        /// Provider identifier.
        provider: String,
    },

    /// The call did not finish within its deadline.
    #[error("{provider} timed out after {elapsed:?}")]
    Timeout {
        /// Provider identifier.
        provider: String,
        /// The deadline that expired.
        elapsed: Duration,
    },
}

impl ProviderError {
    /// Returns `true` for the rate-limit condition that survives retries.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Awaits `future` for at most `limit`, mapping expiry to
/// [`ProviderError::Timeout`].
///
/// # Errors
///
/// Returns the future's own error, or [`ProviderError::Timeout`].
pub async fn with_timeout<T, E, Fut>(provider: &str, limit: Duration, future: Fut) -> Result<T, E>
where
    Fut: std::future::Future<Output = Result<T, E>>,
    E: From<ProviderError>,
{
    tokio::time::timeout(limit, future).await.unwrap_or_else(|_| {
        Err(ProviderError::Timeout {
            provider: provider.to_string(),
            elapsed: limit,
        }
        .into())
    })
}
