//! Nager.Date public-holiday calendar adapter.
//!
//! Keyless. Only nationwide holidays are returned; each becomes a
//! citywide all-day event at the area center with the configured holiday
//! attendance.
//!
//! See <https://date.nager.at/Api>

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta};
use citypulse_config::{EventsConfig, ProvidersConfig};
use citypulse_events_models::{EventCandidate, EventCategory, EventSource};
use citypulse_provider::retry;
use citypulse_spatial::Location;

use super::{local_to_utc, slug, str_at};
use crate::directory::{DirectoryError, EventDirectory, EventQuery};

/// Public-holiday directory backed by Nager.Date v3.
#[derive(Debug, Clone)]
pub struct PublicHolidayDirectory {
    id: String,
    client: reqwest::Client,
    base_url: String,
    policy: ProvidersConfig,
    events: EventsConfig,
    timeout: Option<Duration>,
}

impl PublicHolidayDirectory {
    #[must_use]
    pub const fn new(
        id: String,
        client: reqwest::Client,
        base_url: String,
        policy: ProvidersConfig,
        events: EventsConfig,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            policy,
            events,
            timeout,
        }
    }
}

#[async_trait]
impl EventDirectory for PublicHolidayDirectory {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> EventSource {
        EventSource::PublicHoliday
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn search(&self, query: &EventQuery) -> Result<Vec<EventCandidate>, DirectoryError> {
        let offset = self.events.utc_offset();
        let first_year = query.from.with_timezone(&offset).year();
        let last_year = query.to.with_timezone(&offset).year();
        let base = self.base_url.trim_end_matches('/');
        let country = &self.events.country_code;

        let mut candidates = Vec::new();
        for year in first_year..=last_year {
            let url = format!("{base}/{year}/{country}");
            let body = retry::send_json(&self.id, &self.policy, || self.client.get(&url)).await?;
            candidates.extend(parse_response(&body, &self.events, query.center)?);
        }

        log::debug!(
            "{}: {} nationwide holidays in {first_year}..={last_year}",
            self.id,
            candidates.len()
        );
        Ok(candidates)
    }
}

/// Parses a `PublicHolidays/{year}/{country}` array.
///
/// Regional holidays (`global: false`) are skipped. Entries with an
/// unparseable date keep `start_time` empty and are dropped later.
///
/// # Errors
///
/// Returns [`DirectoryError::Parse`] if the body is not an array.
pub fn parse_response(
    body: &serde_json::Value,
    events: &EventsConfig,
    center: Location,
) -> Result<Vec<EventCandidate>, DirectoryError> {
    let holidays = body.as_array().ok_or_else(|| DirectoryError::Parse {
        message: "Nager.Date response is not an array".to_string(),
    })?;

    let offset = events.utc_offset();
    let country = events.country_code.to_ascii_lowercase();

    Ok(holidays
        .iter()
        .filter(|h| h.get("global").and_then(serde_json::Value::as_bool) != Some(false))
        .map(|holiday| {
            let date = str_at(holiday, "/date")
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let start = date.and_then(|d| local_to_utc(d, NaiveTime::MIN, offset));
            let name = str_at(holiday, "/name").or_else(|| str_at(holiday, "/localName"));

            EventCandidate {
                id: date.zip(name).map(|(d, n)| format!("nager:{country}:{d}:{}", slug(n))),
                name: name.map(String::from),
                category: Some(EventCategory::Holiday),
                venue_name: Some(events.area_name.clone()),
                venue_address: None,
                venue_location: Some(center),
                start_time: start,
                end_time: start.map(|s| s + TimeDelta::days(1)),
                expected_attendees: Some(events.holiday_attendance),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn center() -> Location {
        Location::new(10.7769, 106.7009)
    }

    #[test]
    fn parses_nationwide_holidays() {
        let body = json!([
            {
                "date": "2025-04-30",
                "localName": "Ngày Giải phóng miền Nam",
                "name": "Reunification Day",
                "countryCode": "VN",
                "fixed": true,
                "global": true,
                "counties": null,
                "launchYear": null,
                "types": ["Public"]
            },
            {
                "date": "2025-09-02",
                "localName": "Quốc khánh",
                "name": "National Day",
                "countryCode": "VN",
                "global": true,
                "types": ["Public"]
            }
        ]);
        let events = EventsConfig::default();
        let candidates = parse_response(&body, &events, center()).unwrap();
        assert_eq!(candidates.len(), 2);

        let reunification = &candidates[0];
        assert_eq!(
            reunification.id.as_deref(),
            Some("nager:vn:2025-04-30:reunification-day")
        );
        assert_eq!(reunification.category, Some(EventCategory::Holiday));
        assert_eq!(reunification.venue_name.as_deref(), Some("Ho Chi Minh City"));
        assert_eq!(reunification.venue_location, Some(center()));
        assert_eq!(reunification.expected_attendees, Some(50_000));
        // Local midnight at UTC+7.
        assert_eq!(
            reunification.start_time.unwrap().to_rfc3339(),
            "2025-04-29T17:00:00+00:00"
        );
        assert_eq!(
            reunification.end_time.unwrap() - reunification.start_time.unwrap(),
            TimeDelta::days(1)
        );
    }

    #[test]
    fn skips_regional_holidays_and_tolerates_bad_dates() {
        let body = json!([
            { "date": "2025-01-01", "name": "Regional Day", "global": false },
            { "date": "first of May", "name": "Labour Day", "global": true }
        ]);
        let candidates = parse_response(&body, &EventsConfig::default(), center()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].start_time.is_none());
        assert!(candidates[0].id.is_none());
    }

    #[test]
    fn non_array_body_is_an_error() {
        let body = json!({ "type": "https://tools.ietf.org/html/rfc7231", "status": 404 });
        assert!(matches!(
            parse_response(&body, &EventsConfig::default(), center()),
            Err(DirectoryError::Parse { .. })
        ));
    }
}
