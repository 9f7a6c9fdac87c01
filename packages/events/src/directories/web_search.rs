//! SerpApi Google Events adapter.
//!
//! Keyed. Results carry display dates without a year ("Mar 7") and
//! free-form times ("Sat, Mar 7, 7 – 10 PM"); the year is inferred from the
//! query horizon. Coordinates are only available when the map link embeds
//! them, so many results are dropped downstream for lack of a location.
//!
//! See <https://serpapi.com/google-events-api>

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use citypulse_config::{EventsConfig, ProvidersConfig};
use citypulse_events_models::{EventCandidate, EventSource};
use citypulse_provider::credentials::CredentialPool;
use citypulse_provider::retry;
use citypulse_spatial::Location;
use regex::Regex;

use super::{local_to_utc, slug, str_at};
use crate::classify::classify;
use crate::directory::{DirectoryError, EventDirectory, EventQuery};

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+(\d{1,2})\b,?")
        .expect("valid regex")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(AM|PM)?").expect("valid regex")
});

static MERIDIEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(AM|PM)\b").expect("valid regex"));

static MAP_COORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:@|[?&](?:ll|q|query)=)(-?\d{1,2}\.\d+),\s*(-?\d{1,3}\.\d+)")
        .expect("valid regex")
});

/// Web-search directory backed by SerpApi's `google_events` engine.
#[derive(Debug, Clone)]
pub struct WebSearchDirectory {
    id: String,
    client: reqwest::Client,
    base_url: String,
    pool: CredentialPool,
    policy: ProvidersConfig,
    events: EventsConfig,
    query_template: String,
    timeout: Option<Duration>,
}

impl WebSearchDirectory {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: String,
        client: reqwest::Client,
        base_url: String,
        pool: CredentialPool,
        policy: ProvidersConfig,
        events: EventsConfig,
        query_template: String,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            pool,
            policy,
            events,
            query_template,
            timeout,
        }
    }
}

#[async_trait]
impl EventDirectory for WebSearchDirectory {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> EventSource {
        EventSource::WebSearch
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn search(&self, query: &EventQuery) -> Result<Vec<EventCandidate>, DirectoryError> {
        let q = self.query_template.replace("{area}", &self.events.area_name);
        let gl = self.events.country_code.to_ascii_lowercase();

        let body = retry::send_json_with_credentials(&self.pool, &self.policy, |key| {
            self.client.get(&self.base_url).query(&[
                ("engine", "google_events"),
                ("q", q.as_str()),
                ("hl", "en"),
                ("gl", gl.as_str()),
                ("api_key", key),
            ])
        })
        .await?;

        let candidates = parse_response(&body, &self.events, query.from)?;
        log::debug!("{}: {} results for {q:?}", self.id, candidates.len());
        Ok(candidates)
    }
}

/// Parses a SerpApi `google_events` response.
///
/// `reference` anchors year inference: a month/day more than 30 days
/// before it is assumed to be next year.
///
/// # Errors
///
/// Returns [`DirectoryError::Parse`] if SerpApi reports an error. A
/// response without `events_results` has no results.
pub fn parse_response(
    body: &serde_json::Value,
    events: &EventsConfig,
    reference: DateTime<Utc>,
) -> Result<Vec<EventCandidate>, DirectoryError> {
    if let Some(error) = str_at(body, "/error") {
        // SerpApi reports "no results" as an error string.
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(DirectoryError::Parse {
            message: format!("SerpApi error: {error}"),
        });
    }
    let Some(results) = body.get("events_results").and_then(serde_json::Value::as_array) else {
        return Ok(Vec::new());
    };

    let offset = events.utc_offset();
    Ok(results
        .iter()
        .map(|result| parse_result(result, events, reference, offset))
        .collect())
}

fn parse_result(
    result: &serde_json::Value,
    events: &EventsConfig,
    reference: DateTime<Utc>,
    offset: FixedOffset,
) -> EventCandidate {
    let title = str_at(result, "/title");
    let description = str_at(result, "/description").unwrap_or_default();
    let category = classify(&[title.unwrap_or_default(), description]);

    let address_lines: Vec<&str> = result
        .get("address")
        .and_then(serde_json::Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    // The first address line is "Venue, street" when no venue object is
    // present.
    let venue_name = str_at(result, "/venue/name").map(String::from).or_else(|| {
        address_lines
            .first()
            .and_then(|line| line.split(',').next())
            .map(|s| s.trim().to_string())
    });

    let venue_location = str_at(result, "/event_location_map/link")
        .and_then(coordinates_from_map_link)
        .or_else(|| {
            let lat = result.pointer("/gps_coordinates/latitude")?.as_f64()?;
            let lng = result.pointer("/gps_coordinates/longitude")?.as_f64()?;
            Some(Location::new(lat, lng))
        });

    let start_date = str_at(result, "/date/start_date")
        .and_then(|d| parse_month_day(d, reference.with_timezone(&offset).date_naive()));
    let when = str_at(result, "/date/when").unwrap_or_default();
    let (start_clock, end_clock) = parse_clock_range(when);

    let start_time = start_date
        .and_then(|d| local_to_utc(d, start_clock.unwrap_or(NaiveTime::MIN), offset));
    let end_time = start_date.zip(end_clock).and_then(|(d, end)| {
        let end = local_to_utc(d, end, offset)?;
        match start_time {
            Some(start) if end <= start => Some(end + TimeDelta::days(1)),
            _ => Some(end),
        }
    });

    let id = title.map(|t| {
        let date = start_date.map(|d| d.to_string()).unwrap_or_default();
        format!("serpapi:{}:{date}", slug(t))
    });

    EventCandidate {
        id,
        name: title.map(String::from),
        category: Some(category),
        venue_name,
        venue_address: (!address_lines.is_empty()).then(|| address_lines.join(", ")),
        venue_location,
        start_time,
        end_time,
        expected_attendees: events.attendance_estimate(category.as_ref()),
    }
}

/// Parses "Mar 7" style dates, inferring the year from `reference`.
fn parse_month_day(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let caps = MONTH_DAY_RE.captures(text)?;
    let month = match caps[1].to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    let day: u32 = caps[2].parse().ok()?;

    let this_year = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if this_year < reference - TimeDelta::days(30) {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

/// Extracts start and end clock times from a `when` string such as
/// `"Sat, Mar 7, 7 – 10 PM"` or `"Sat, Mar 7, 7:30 PM – 11 PM"`.
///
/// A start without AM/PM borrows the first meridiem that follows it. An
/// end that begins with another date (a multi-day event) is ignored.
fn parse_clock_range(when: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let rest = MONTH_DAY_RE
        .find(when)
        .map_or(when, |m| &when[m.end()..]);
    let (start_text, end_text) = match rest.split_once(['–', '-']) {
        Some((start, end)) => (start, Some(end)),
        None => (rest, None),
    };

    let end = end_text.and_then(|text| {
        if MONTH_DAY_RE.is_match(text) {
            return None;
        }
        let caps = TIME_RE.captures(text)?;
        let meridiem = caps.get(3).map(|m| m.as_str());
        clock(&caps[1], caps.get(2).map(|m| m.as_str()), meridiem)
    });

    let start = TIME_RE.captures(start_text).and_then(|caps| {
        let meridiem = caps
            .get(3)
            .map(|m| m.as_str())
            .or_else(|| MERIDIEM_RE.find(rest).map(|m| m.as_str()));
        clock(&caps[1], caps.get(2).map(|m| m.as_str()), meridiem)
    });

    (start, end)
}

fn clock(hour: &str, minute: Option<&str>, meridiem: Option<&str>) -> Option<NaiveTime> {
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.map_or(Some(0), |m| m.parse().ok())?;
    match meridiem.map(str::to_ascii_uppercase).as_deref() {
        Some("PM") if hour < 12 => hour += 12,
        Some("AM") if hour == 12 => hour = 0,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Pulls `lat,lng` out of a Google Maps link when present.
fn coordinates_from_map_link(link: &str) -> Option<Location> {
    let caps = MAP_COORDS_RE.captures(link)?;
    let location = Location::new(caps[1].parse().ok()?, caps[2].parse().ok()?);
    location.is_valid().then_some(location)
}
