//! HTTP client for the broker's entity query endpoint.

use async_trait::async_trait;
use citypulse_air_quality::reading::{CurrentReadingSource, ReadingError};
use citypulse_air_quality_models::PollutantReading;
use citypulse_config::ProvidersConfig;
use citypulse_events::analyze::{CameraDirectory, CongestionSource, SensorError};
use citypulse_events_models::CameraRef;
use citypulse_provider::retry;
use citypulse_spatial::Location;
use serde_json::Value;

use crate::parse::{parse_air_quality, parse_cameras, parse_congestion};
use crate::{BROKER_URL_ENV, BrokerError};

const PROVIDER_ID: &str = "context_broker";
const ENTITIES_PATH: &str = "/ngsi-ld/v1/entities";
const PAGE_SIZE: usize = 1000;

/// Read-only NGSI-LD client.
#[derive(Debug, Clone)]
pub struct ContextBrokerClient {
    client: reqwest::Client,
    base_url: String,
    policy: ProvidersConfig,
    station_radius_km: f64,
}

impl ContextBrokerClient {
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        base_url: String,
        policy: ProvidersConfig,
        station_radius_km: f64,
    ) -> Self {
        Self {
            client,
            base_url,
            policy,
            station_radius_km,
        }
    }

    /// Builds a client for the broker named by `CONTEXT_BROKER_URL`, or
    /// `None` when the variable is unset or empty.
    #[must_use]
    pub fn from_env(
        client: reqwest::Client,
        policy: ProvidersConfig,
        station_radius_km: f64,
    ) -> Option<Self> {
        let base_url = std::env::var(BROKER_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())?;
        Some(Self::new(client, base_url, policy, station_radius_km))
    }

    fn entities_url(&self) -> String {
        format!("{}{ENTITIES_PATH}", self.base_url.trim_end_matches('/'))
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Value, BrokerError> {
        let url = self.entities_url();
        let body = retry::send_json(PROVIDER_ID, &self.policy, || {
            self.client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[("options", "keyValues")])
                .query(params)
        })
        .await?;
        Ok(body)
    }

    /// Every `Camera` entity, following `offset` pagination.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if any page fails.
    pub async fn list_cameras(&self) -> Result<Vec<CameraRef>, BrokerError> {
        let mut cameras = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .query(&[
                    ("type", "Camera".to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .await?;
            let returned = page.as_array().map_or(0, Vec::len);
            cameras.extend(parse_cameras(&page)?);
            if returned < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        log::debug!("{PROVIDER_ID}: {} cameras", cameras.len());
        Ok(cameras)
    }

    /// Mean congestion across `camera_ids`, or `None` when none report.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the query fails.
    pub async fn mean_congestion(&self, camera_ids: &[String]) -> Result<Option<f64>, BrokerError> {
        if camera_ids.is_empty() {
            return Ok(None);
        }
        let page = self
            .query(&[
                ("type", "Camera".to_string()),
                ("id", camera_ids.join(",")),
                ("attrs", "congestionLevel".to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ])
            .await?;
        parse_congestion(&page)
    }

    /// Latest `AirQualityObserved` reading near `location`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the query fails.
    pub async fn latest_air_quality(
        &self,
        location: Location,
    ) -> Result<Option<PollutantReading>, BrokerError> {
        let max_distance_m = (self.station_radius_km * 1000.0).round();
        let page = self
            .query(&[
                ("type", "AirQualityObserved".to_string()),
                ("georel", format!("near;maxDistance=={max_distance_m:.0}")),
                ("geometry", "Point".to_string()),
                ("coordinates", format!("[{},{}]", location.lng, location.lat)),
                ("limit", PAGE_SIZE.to_string()),
            ])
            .await?;
        parse_air_quality(&page, location, self.station_radius_km)
    }
}

#[async_trait]
impl CameraDirectory for ContextBrokerClient {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn cameras(&self) -> Result<Vec<CameraRef>, SensorError> {
        Ok(self.list_cameras().await?)
    }
}

#[async_trait]
impl CongestionSource for ContextBrokerClient {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn congestion(&self, camera_ids: &[String]) -> Result<f64, SensorError> {
        Ok(self.mean_congestion(camera_ids).await?.unwrap_or(0.0))
    }
}

#[async_trait]
impl CurrentReadingSource for ContextBrokerClient {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn current_reading(
        &self,
        location: Location,
    ) -> Result<Option<PollutantReading>, ReadingError> {
        let reading = self.latest_air_quality(location).await?;
        if reading.is_none() {
            log::warn!(
                "{PROVIDER_ID}: no air-quality station within {} km of {location}",
                self.station_radius_km
            );
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ContextBrokerClient {
        ContextBrokerClient::new(
            reqwest::Client::new(),
            base_url.to_string(),
            ProvidersConfig::default(),
            10.0,
        )
    }

    #[test]
    fn entities_url_tolerates_trailing_slash() {
        assert_eq!(
            client("http://orion:1026/").entities_url(),
            "http://orion:1026/ngsi-ld/v1/entities"
        );
        assert_eq!(
            client("http://orion:1026").entities_url(),
            "http://orion:1026/ngsi-ld/v1/entities"
        );
    }

    #[tokio::test]
    async fn empty_camera_list_needs_no_request() {
        // An unroutable base URL proves no request is made.
        let client = client("http://127.0.0.1:9");
        assert_eq!(client.mean_congestion(&[]).await.unwrap(), None);
    }
}
