//! Entity parsers for `options=keyValues` responses.
//!
//! Entities that lack a usable location or value are skipped rather than
//! failing the whole response.

use chrono::{DateTime, Utc};
use citypulse_air_quality_models::PollutantReading;
use citypulse_events_models::CameraRef;
use citypulse_spatial::Location;
use serde_json::Value;

use crate::BrokerError;

fn entities<'a>(body: &'a Value, kind: &str) -> Result<&'a [Value], BrokerError> {
    body.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| BrokerError::Parse {
            message: format!("{kind} query did not return an entity array"),
        })
}

/// A keyValues attribute. Typed literals arrive as `{"@value": ...}`.
fn attr<'a>(entity: &'a Value, name: &str) -> Option<&'a Value> {
    let value = entity.get(name)?;
    Some(value.get("@value").unwrap_or(value))
}

fn number(entity: &Value, name: &str) -> Option<f64> {
    attr(entity, name)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// GeoJSON `Point` location, `[lng, lat]`.
#[must_use]
pub fn location(entity: &Value) -> Option<Location> {
    let coordinates = entity.pointer("/location/coordinates")?.as_array()?;
    let [lng, lat] = coordinates.as_slice() else {
        return None;
    };
    let location = Location::new(lat.as_f64()?, lng.as_f64()?);
    location.is_valid().then_some(location)
}

fn observed_at(entity: &Value) -> Option<DateTime<Utc>> {
    let raw = attr(entity, "dateObserved")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parses `Camera` entities.
///
/// # Errors
///
/// Returns [`BrokerError::Parse`] if the body is not an array.
pub fn parse_cameras(body: &Value) -> Result<Vec<CameraRef>, BrokerError> {
    let cameras = entities(body, "Camera")?
        .iter()
        .filter_map(|entity| {
            let id = entity.get("id").and_then(Value::as_str)?;
            let Some(location) = location(entity) else {
                log::debug!("Camera {id} has no usable location, skipping");
                return None;
            };
            let street = entity
                .pointer("/address/streetAddress")
                .and_then(Value::as_str)
                .or_else(|| attr(entity, "street").and_then(Value::as_str))
                .map(String::from);
            Some(CameraRef {
                id: id.to_string(),
                location,
                street,
            })
        })
        .collect();
    Ok(cameras)
}

/// Mean `congestionLevel` across the returned cameras, clamped to
/// `[0, 1]`. `None` when no camera reports a level.
///
/// # Errors
///
/// Returns [`BrokerError::Parse`] if the body is not an array.
pub fn parse_congestion(body: &Value) -> Result<Option<f64>, BrokerError> {
    let levels: Vec<f64> = entities(body, "Camera")?
        .iter()
        .filter_map(|entity| number(entity, "congestionLevel"))
        .map(|level| level.clamp(0.0, 1.0))
        .collect();

    if levels.is_empty() {
        return Ok(None);
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = levels.iter().sum::<f64>() / levels.len() as f64;
    Ok(Some(mean))
}

/// Picks the most recent `AirQualityObserved` entity within `radius_km`
/// of `near`; ties go to the closer station.
///
/// Entities without an `airQualityIndex`, `dateObserved`, or location are
/// ignored. Missing pollutant attributes stay empty.
///
/// # Errors
///
/// Returns [`BrokerError::Parse`] if the body is not an array.
pub fn parse_air_quality(
    body: &Value,
    near: Location,
    radius_km: f64,
) -> Result<Option<PollutantReading>, BrokerError> {
    let best = entities(body, "AirQualityObserved")?
        .iter()
        .filter_map(|entity| {
            let aqi = number(entity, "airQualityIndex")?;
            let observed = observed_at(entity)?;
            let distance = location(entity)?.distance_km(&near);
            (distance <= radius_km).then_some((entity, aqi, observed, distance))
        })
        .max_by(|a, b| a.2.cmp(&b.2).then_with(|| b.3.total_cmp(&a.3)));

    Ok(best.map(|(entity, aqi, observed_at, _)| PollutantReading {
        aqi,
        pm25: number(entity, "pm25"),
        pm10: number(entity, "pm10"),
        no2: number(entity, "no2"),
        o3: number(entity, "o3"),
        co: number(entity, "co"),
        so2: number(entity, "so2"),
        observed_at,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn center() -> Location {
        Location::new(10.7769, 106.7009)
    }

    #[test]
    fn parses_cameras_and_skips_unlocated_ones() {
        let body = json!([
            {
                "id": "urn:ngsi-ld:Camera:cam-001",
                "type": "Camera",
                "location": { "type": "Point", "coordinates": [106.6990, 10.7798] },
                "address": { "streetAddress": "Công xã Paris" },
                "congestionLevel": 0.4
            },
            {
                "id": "urn:ngsi-ld:Camera:cam-002",
                "type": "Camera",
                "location": { "type": "Point", "coordinates": [106.7031, 10.7766] }
            },
            {
                "id": "urn:ngsi-ld:Camera:cam-003",
                "type": "Camera"
            },
            {
                "id": "urn:ngsi-ld:Camera:cam-004",
                "type": "Camera",
                "location": { "type": "Point", "coordinates": [200.0, 10.0] }
            }
        ]);
        let cameras = parse_cameras(&body).unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].id, "urn:ngsi-ld:Camera:cam-001");
        assert_eq!(cameras[0].location, Location::new(10.7798, 106.6990));
        assert_eq!(cameras[0].street.as_deref(), Some("Công xã Paris"));
        assert!(cameras[1].street.is_none());
    }

    #[test]
    fn congestion_is_the_clamped_mean_of_reporting_cameras() {
        let body = json!([
            { "id": "a", "congestionLevel": 0.2 },
            { "id": "b", "congestionLevel": 1.4 },
            { "id": "c" },
            { "id": "d", "congestionLevel": { "@type": "Number", "@value": 0.3 } }
        ]);
        let level = parse_congestion(&body).unwrap().unwrap();
        assert!((level - 0.5).abs() < 1e-9);
    }

    #[test]
    fn no_reporting_cameras_means_no_level() {
        let body = json!([{ "id": "a" }]);
        assert_eq!(parse_congestion(&body).unwrap(), None);
    }

    #[test]
    fn picks_the_latest_nearby_station() {
        let body = json!([
            {
                "id": "urn:ngsi-ld:AirQualityObserved:district-1",
                "type": "AirQualityObserved",
                "location": { "type": "Point", "coordinates": [106.7000, 10.7760] },
                "dateObserved": "2025-03-01T09:00:00Z",
                "airQualityIndex": 140.0,
                "pm25": 52.1
            },
            {
                "id": "urn:ngsi-ld:AirQualityObserved:district-3",
                "type": "AirQualityObserved",
                "location": { "type": "Point", "coordinates": [106.6850, 10.7830] },
                "dateObserved": { "@type": "DateTime", "@value": "2025-03-01T10:00:00Z" },
                "airQualityIndex": 155,
                "pm25": 60.4,
                "pm10": 88.0,
                "no2": 41.0
            },
            {
                "id": "urn:ngsi-ld:AirQualityObserved:hanoi",
                "type": "AirQualityObserved",
                "location": { "type": "Point", "coordinates": [105.8542, 21.0285] },
                "dateObserved": "2025-03-01T11:00:00Z",
                "airQualityIndex": 180.0
            }
        ]);
        let reading = parse_air_quality(&body, center(), 10.0).unwrap().unwrap();
        assert!((reading.aqi - 155.0).abs() < f64::EPSILON);
        assert_eq!(reading.pm25, Some(60.4));
        assert_eq!(reading.pm10, Some(88.0));
        assert_eq!(reading.o3, None);
        assert_eq!(reading.observed_at.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }

    #[test]
    fn stations_without_an_index_are_ignored() {
        let body = json!([
            {
                "id": "x",
                "location": { "type": "Point", "coordinates": [106.7009, 10.7769] },
                "dateObserved": "2025-03-01T09:00:00Z",
                "pm25": 30.0
            }
        ]);
        assert_eq!(parse_air_quality(&body, center(), 10.0).unwrap(), None);
    }

    #[test]
    fn error_object_is_a_parse_error() {
        let body = json!({
            "type": "https://uri.etsi.org/ngsi-ld/errors/BadRequestData",
            "title": "Invalid geo-query"
        });
        assert!(matches!(
            parse_cameras(&body),
            Err(BrokerError::Parse { .. })
        ));
    }
}
