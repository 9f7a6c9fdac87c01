//! Ticketmaster Discovery API v2 adapter.
//!
//! Keyed: credentials come from a rotating pool. Ticketmaster does not
//! publish capacity, so attendance is estimated from the category.
//!
//! See <https://developer.ticketmaster.com/products-and-docs/apis/discovery-api/v2/>

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use citypulse_config::{EventsConfig, ProvidersConfig};
use citypulse_events_models::{EventCandidate, EventSource};
use citypulse_provider::credentials::CredentialPool;
use citypulse_provider::retry;
use citypulse_spatial::Location;

use super::{local_to_utc, str_at};
use crate::classify::from_ticketing_segment;
use crate::directory::{DirectoryError, EventDirectory, EventQuery};

/// Ticketing-platform directory backed by the Discovery API.
#[derive(Debug, Clone)]
pub struct TicketmasterDirectory {
    id: String,
    client: reqwest::Client,
    base_url: String,
    pool: CredentialPool,
    policy: ProvidersConfig,
    events: EventsConfig,
    page_size: u32,
    timeout: Option<Duration>,
}

impl TicketmasterDirectory {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: String,
        client: reqwest::Client,
        base_url: String,
        pool: CredentialPool,
        policy: ProvidersConfig,
        events: EventsConfig,
        page_size: u32,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            pool,
            policy,
            events,
            page_size,
            timeout,
        }
    }
}

#[async_trait]
impl EventDirectory for TicketmasterDirectory {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> EventSource {
        EventSource::Ticketing
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn search(&self, query: &EventQuery) -> Result<Vec<EventCandidate>, DirectoryError> {
        let latlong = query.center.to_string();
        let radius = format!("{:.0}", query.radius_km.ceil());
        let start = query.from.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let end = query.to.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let size = self.page_size.to_string();

        let body = retry::send_json_with_credentials(&self.pool, &self.policy, |key| {
            self.client.get(&self.base_url).query(&[
                ("apikey", key),
                ("latlong", latlong.as_str()),
                ("radius", radius.as_str()),
                ("unit", "km"),
                ("startDateTime", start.as_str()),
                ("endDateTime", end.as_str()),
                ("size", size.as_str()),
                ("sort", "date,asc"),
            ])
        })
        .await?;

        let candidates = parse_response(&body, &self.events)?;
        log::debug!("{}: {} listings", self.id, candidates.len());
        Ok(candidates)
    }
}

/// Parses a Discovery API `events.json` page.
///
/// A page without `_embedded` has no results.
///
/// # Errors
///
/// Returns [`DirectoryError::Parse`] if the body is not a JSON object or
/// `_embedded.events` is not an array.
pub fn parse_response(
    body: &serde_json::Value,
    events: &EventsConfig,
) -> Result<Vec<EventCandidate>, DirectoryError> {
    if !body.is_object() {
        return Err(DirectoryError::Parse {
            message: "Ticketmaster response is not an object".to_string(),
        });
    }
    let Some(embedded) = body.get("_embedded") else {
        return Ok(Vec::new());
    };
    let listings = embedded
        .get("events")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| DirectoryError::Parse {
            message: "Ticketmaster _embedded.events is not an array".to_string(),
        })?;

    Ok(listings
        .iter()
        .map(|listing| parse_listing(listing, events))
        .collect())
}

fn parse_listing(listing: &serde_json::Value, events: &EventsConfig) -> EventCandidate {
    let name = str_at(listing, "/name");
    let segment = str_at(listing, "/classifications/0/segment/name");
    let genre = str_at(listing, "/classifications/0/genre/name").unwrap_or_default();
    let category = from_ticketing_segment(segment, &[name.unwrap_or_default(), genre]);

    let venue = listing.pointer("/_embedded/venues/0");
    let venue_location = venue.and_then(|v| {
        let lat = parse_coordinate(v.pointer("/location/latitude")?)?;
        let lng = parse_coordinate(v.pointer("/location/longitude")?)?;
        Some(Location::new(lat, lng))
    });
    let venue_address = venue.and_then(|v| {
        let parts: Vec<&str> = ["/address/line1", "/city/name"]
            .iter()
            .filter_map(|p| str_at(v, p))
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    });

    EventCandidate {
        id: str_at(listing, "/id").map(|id| format!("ticketmaster:{id}")),
        name: name.map(String::from),
        category: Some(category),
        venue_name: venue.and_then(|v| str_at(v, "/name")).map(String::from),
        venue_address,
        venue_location,
        start_time: parse_start(listing, events),
        end_time: str_at(listing, "/dates/end/dateTime").and_then(parse_utc),
        expected_attendees: events.attendance_estimate(category.as_ref()),
    }
}

/// `dates.start.dateTime` (UTC), else `localDate` + `localTime` in the
/// area's offset, else `localDate` at local midnight.
fn parse_start(listing: &serde_json::Value, events: &EventsConfig) -> Option<DateTime<Utc>> {
    if let Some(utc) = str_at(listing, "/dates/start/dateTime").and_then(parse_utc) {
        return Some(utc);
    }
    let date = NaiveDate::parse_from_str(str_at(listing, "/dates/start/localDate")?, "%Y-%m-%d")
        .ok()?;
    let time = str_at(listing, "/dates/start/localTime")
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
        .unwrap_or(NaiveTime::MIN);
    local_to_utc(date, time, events.utc_offset())
}

fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Ticketmaster sends coordinates as strings.
fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use citypulse_events_models::EventCategory;
    use serde_json::json;

    use super::*;

    fn fixture() -> serde_json::Value {
        json!({
            "_embedded": {
                "events": [
                    {
                        "name": "Vietnam vs Thailand - AFF Cup Final",
                        "id": "G5diZ9bKpl3Qx",
                        "dates": {
                            "start": {
                                "localDate": "2025-03-02",
                                "localTime": "19:30:00",
                                "dateTime": "2025-03-02T12:30:00Z"
                            },
                            "end": { "dateTime": "2025-03-02T14:30:00Z" }
                        },
                        "classifications": [{
                            "segment": { "name": "Sports" },
                            "genre": { "name": "Soccer" }
                        }],
                        "_embedded": {
                            "venues": [{
                                "name": "Thong Nhat Stadium",
                                "address": { "line1": "138 Dao Duy Tu" },
                                "city": { "name": "Ho Chi Minh City" },
                                "location": { "longitude": "106.6633", "latitude": "10.7603" }
                            }]
                        }
                    },
                    {
                        "name": "Acoustic Evening",
                        "id": "Z7r9jZ1A7",
                        "dates": {
                            "start": { "localDate": "2025-03-03", "localTime": "20:00:00" }
                        },
                        "classifications": [{ "segment": { "name": "Music" } }]
                    }
                ]
            },
            "page": { "size": 20, "totalElements": 2, "totalPages": 1, "number": 0 }
        })
    }

    #[test]
    fn parses_listing_with_venue() {
        let events = EventsConfig::default();
        let candidates = parse_response(&fixture(), &events).unwrap();
        assert_eq!(candidates.len(), 2);

        let derby = &candidates[0];
        assert_eq!(derby.id.as_deref(), Some("ticketmaster:G5diZ9bKpl3Qx"));
        assert_eq!(derby.category, Some(EventCategory::Sports));
        assert_eq!(derby.venue_name.as_deref(), Some("Thong Nhat Stadium"));
        assert_eq!(
            derby.venue_address.as_deref(),
            Some("138 Dao Duy Tu, Ho Chi Minh City")
        );
        let location = derby.venue_location.unwrap();
        assert!((location.lat - 10.7603).abs() < 1e-9);
        assert!((location.lng - 106.6633).abs() < 1e-9);
        assert_eq!(
            derby.start_time.unwrap().to_rfc3339(),
            "2025-03-02T12:30:00+00:00"
        );
        assert!(derby.end_time.is_some());
        assert_eq!(derby.expected_attendees, Some(30_000));
    }

    #[test]
    fn missing_venue_and_utc_time_are_tolerated() {
        let events = EventsConfig::default();
        let candidates = parse_response(&fixture(), &events).unwrap();
        let evening = &candidates[1];
        assert_eq!(evening.category, Some(EventCategory::Concert));
        assert!(evening.venue_name.is_none());
        assert!(evening.venue_location.is_none());
        // 20:00 at UTC+7.
        assert_eq!(
            evening.start_time.unwrap().to_rfc3339(),
            "2025-03-03T13:00:00+00:00"
        );
        assert_eq!(evening.expected_attendees, Some(15_000));
    }

    #[test]
    fn empty_page_has_no_embedded_block() {
        let body = json!({ "page": { "size": 20, "totalElements": 0 } });
        assert!(parse_response(&body, &EventsConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_an_error() {
        assert!(matches!(
            parse_response(&json!([]), &EventsConfig::default()),
            Err(DirectoryError::Parse { .. })
        ));
    }
}
