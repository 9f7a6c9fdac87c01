//! Google Directions API adapter.
//!
//! Keyed: credentials come from the `GOOGLE_MAPS_API_KEYS` pool. Google
//! reports quota and key problems in the body with HTTP 200, so the body
//! `status` is checked after the transport succeeds.
//!
//! See <https://developers.google.com/maps/documentation/directions/get-directions>

use async_trait::async_trait;
use citypulse_config::ProvidersConfig;
use citypulse_provider::ProviderError;
use citypulse_provider::credentials::CredentialPool;
use citypulse_provider::retry;
use citypulse_routing_models::RouteEstimate;
use citypulse_spatial::Location;
use serde_json::Value;

use crate::provider::{RouteProviderError, RoutingProvider};

/// Provider identifier and credential pool name.
pub const PROVIDER_ID: &str = "google_directions";

/// Env var holding comma-separated API keys.
pub const API_KEYS_ENV: &str = "GOOGLE_MAPS_API_KEYS";

/// Public Directions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Driving directions from Google.
#[derive(Debug, Clone)]
pub struct GoogleDirectionsClient {
    client: reqwest::Client,
    base_url: String,
    pool: CredentialPool,
    policy: ProvidersConfig,
}

impl GoogleDirectionsClient {
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        base_url: String,
        pool: CredentialPool,
        policy: ProvidersConfig,
    ) -> Self {
        Self {
            client,
            base_url,
            pool,
            policy,
        }
    }
}

#[async_trait]
impl RoutingProvider for GoogleDirectionsClient {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn route(
        &self,
        origin: Location,
        destination: Location,
    ) -> Result<RouteEstimate, RouteProviderError> {
        let origin = origin.to_string();
        let destination = destination.to_string();

        let body = retry::send_json_with_credentials(&self.pool, &self.policy, |key| {
            self.client.get(&self.base_url).query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", "driving"),
                ("departure_time", "now"),
                ("key", key),
            ])
        })
        .await?;

        let estimate = parse_response(&body)?;
        log::debug!(
            "{PROVIDER_ID}: {origin} -> {destination}: {:.0}s, {:.0}m",
            estimate.duration_secs,
            estimate.distance_meters
        );
        Ok(estimate)
    }
}

/// Parses a Directions response, summing the legs of the first route.
///
/// Each leg contributes `duration_in_traffic` when present, otherwise
/// `duration`.
///
/// # Errors
///
/// * [`RouteProviderError::NoRoute`] for `ZERO_RESULTS` and `NOT_FOUND`.
/// * [`ProviderError::RateLimited`] for `OVER_QUERY_LIMIT`.
/// * [`RouteProviderError::Parse`] for any other non-`OK` status or a
///   route without legs.
pub fn parse_response(body: &Value) -> Result<RouteEstimate, RouteProviderError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN_ERROR");

    match status {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => {
            return Err(RouteProviderError::NoRoute {
                status: status.to_string(),
            });
        }
        "OVER_QUERY_LIMIT" => {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                attempts: 1,
            }
            .into());
        }
        other => {
            let detail = body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("no error message");
            return Err(RouteProviderError::Parse {
                message: format!("{other}: {detail}"),
            });
        }
    }

    let legs = body
        .pointer("/routes/0/legs")
        .and_then(Value::as_array)
        .filter(|legs| !legs.is_empty())
        .ok_or_else(|| RouteProviderError::Parse {
            message: "route has no legs".to_string(),
        })?;

    let mut duration_secs = 0.0;
    let mut distance_meters = 0.0;
    for leg in legs {
        let duration = leg
            .pointer("/duration_in_traffic/value")
            .or_else(|| leg.pointer("/duration/value"))
            .and_then(Value::as_f64);
        let distance = leg.pointer("/distance/value").and_then(Value::as_f64);
        let (Some(duration), Some(distance)) = (duration, distance) else {
            return Err(RouteProviderError::Parse {
                message: "leg is missing duration or distance".to_string(),
            });
        };
        duration_secs += duration;
        distance_meters += distance;
    }

    Ok(RouteEstimate {
        duration_secs,
        distance_meters,
    })
}
