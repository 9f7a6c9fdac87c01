//! Event directory adapters.
//!
//! Each adapter turns one provider's JSON into [`EventCandidate`]s through
//! a pure `parse_response` function so the schema handling can be tested
//! against fixtures without the network.
//!
//! [`EventCandidate`]: citypulse_events_models::EventCandidate

pub mod holidays;
pub mod ticketmaster;
pub mod web_search;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

/// Interprets a local date and time in the area's fixed offset.
fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    date.and_time(time)
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// Lowercase ASCII-alphanumeric slug for building stable identifiers.
fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Reads a string at a JSON pointer, trimming blanks to `None`.
fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
