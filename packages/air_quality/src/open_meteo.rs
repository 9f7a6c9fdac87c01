//! Open-Meteo hourly forecast client.
//!
//! Keyless. Requests temperature, relative humidity, 10 m wind speed in
//! km/h, and precipitation in UTC.
//!
//! See <https://open-meteo.com/en/docs>

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use citypulse_air_quality_models::HourlyWeather;
use citypulse_config::ProvidersConfig;
use citypulse_provider::retry;
use citypulse_spatial::Location;

use crate::weather::{WeatherError, WeatherForecastClient};

/// Public forecast endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const PROVIDER_ID: &str = "open_meteo";
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation";

/// Weather forecast client backed by Open-Meteo.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    policy: ProvidersConfig,
}

impl OpenMeteoClient {
    /// Creates a client for `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, policy: ProvidersConfig) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            policy,
        }
    }

    /// Creates a client for the public endpoint.
    #[must_use]
    pub fn public(client: reqwest::Client, policy: ProvidersConfig) -> Self {
        Self::new(client, DEFAULT_BASE_URL, policy)
    }
}

#[async_trait]
impl WeatherForecastClient for OpenMeteoClient {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn hourly_forecast(
        &self,
        location: Location,
        hours: u32,
    ) -> Result<Vec<HourlyWeather>, WeatherError> {
        let latitude = location.lat.to_string();
        let longitude = location.lng.to_string();
        // One extra hour so the last predicted hour is covered when the
        // reading was taken late in its hour.
        let forecast_hours = hours.saturating_add(1).to_string();

        let body = retry::send_json(PROVIDER_ID, &self.policy, || {
            self.client.get(&self.base_url).query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("hourly", HOURLY_FIELDS),
                ("forecast_hours", forecast_hours.as_str()),
                ("wind_speed_unit", "kmh"),
                ("precipitation_unit", "mm"),
                ("timezone", "GMT"),
            ])
        })
        .await?;

        let forecast = parse_response(&body)?;
        log::debug!(
            "{PROVIDER_ID}: {} hourly entries for {location}",
            forecast.len()
        );
        Ok(forecast)
    }
}

/// Parses the `hourly` block of an Open-Meteo response.
///
/// `null` values become `None`. Entries whose timestamp cannot be parsed
/// are skipped.
///
/// # Errors
///
/// Returns [`WeatherError::Parse`] if the `hourly.time` array is missing.
pub fn parse_response(body: &serde_json::Value) -> Result<Vec<HourlyWeather>, WeatherError> {
    let hourly = body.get("hourly").ok_or_else(|| WeatherError::Parse {
        message: "missing \"hourly\" object".to_string(),
    })?;
    let times = hourly
        .get("time")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| WeatherError::Parse {
            message: "missing \"hourly.time\" array".to_string(),
        })?;

    let series = |name: &str, index: usize| -> Option<f64> {
        hourly
            .get(name)
            .and_then(|values| values.get(index))
            .and_then(serde_json::Value::as_f64)
    };

    let mut forecast = Vec::with_capacity(times.len());
    for (index, time) in times.iter().enumerate() {
        let Some(time) = time.as_str().and_then(parse_time) else {
            log::warn!("{PROVIDER_ID}: skipping unparseable time {time}");
            continue;
        };
        forecast.push(HourlyWeather {
            time,
            temperature_c: series("temperature_2m", index),
            humidity_pct: series("relative_humidity_2m", index),
            wind_speed_kmh: series("wind_speed_10m", index),
            precipitation_mm: series("precipitation", index),
        });
    }

    Ok(forecast)
}

/// Open-Meteo emits `YYYY-MM-DDTHH:MM` in the requested timezone (GMT).
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|t| t.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
}
