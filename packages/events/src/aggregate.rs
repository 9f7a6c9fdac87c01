//! Merges event directories into one deduplicated list of large events.
//!
//! All directories are queried concurrently, each under its own timeout. A
//! directory that fails, times out, or is rate limited contributes nothing
//! and is reported in [`AggregatedEvents::skipped_sources`].

use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

use chrono::TimeDelta;
use citypulse_config::EventsConfig;
use citypulse_events_models::{
    AggregatedEvents, EventCandidate, EventCategory, EventSource, ExternalEvent, SkippedSource,
    Venue,
};
use citypulse_provider::with_timeout;
use futures::future::join_all;
use regex::Regex;

use crate::EventError;
use crate::directory::{EventDirectory, EventQuery};

/// Characters that do not distinguish one event name from another.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex"));

/// Collapses runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Queries every directory and merges the results.
///
/// # Errors
///
/// Returns [`EventError::InvalidInput`] for an invalid query. Directory
/// failures never fail the aggregation.
pub async fn aggregate(
    directories: &[Arc<dyn EventDirectory>],
    query: &EventQuery,
    config: &EventsConfig,
) -> Result<AggregatedEvents, EventError> {
    query.validate()?;

    let lookups = directories.iter().map(|directory| async move {
        let limit = directory
            .timeout()
            .unwrap_or_else(|| config.default_source_timeout());
        let result = with_timeout(directory.id(), limit, directory.search(query)).await;
        (directory, result)
    });

    let mut candidates: Vec<(EventSource, EventCandidate)> = Vec::new();
    let mut skipped_sources = Vec::new();

    for (directory, result) in join_all(lookups).await {
        match result {
            Ok(found) => {
                log::info!("{}: {} candidates", directory.id(), found.len());
                candidates.extend(found.into_iter().map(|c| (directory.source(), c)));
            }
            Err(e) => {
                log::warn!("{}: skipped: {e}", directory.id());
                skipped_sources.push(SkippedSource {
                    source: directory.id().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let events = merge(candidates, query, config);
    log::info!(
        "Aggregated {} large events ({} sources skipped)",
        events.len(),
        skipped_sources.len()
    );

    Ok(AggregatedEvents {
        events,
        skipped_sources,
    })
}

/// Validates, filters, deduplicates, and sorts raw candidates.
#[must_use]
pub fn merge(
    candidates: Vec<(EventSource, EventCandidate)>,
    query: &EventQuery,
    config: &EventsConfig,
) -> Vec<ExternalEvent> {
    let total = candidates.len();
    let mut events: Vec<ExternalEvent> = candidates
        .into_iter()
        .filter_map(|(source, candidate)| into_event(source, candidate))
        .filter(|e| query.overlaps(e.start_time, e.end_time))
        .filter(|e| e.venue.location.distance_km(&query.center) <= query.radius_km)
        .filter(|e| e.expected_attendees >= config.min_expected_attendees)
        .collect();

    log::debug!(
        "{} of {total} candidates are valid large events in the area and horizon",
        events.len()
    );

    events.sort_by(by_attendance);

    let mut kept: Vec<ExternalEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(original) = kept.iter().find(|k| is_duplicate(k, &event, config)) {
            log::debug!("Dropping {} as a duplicate of {}", event.id, original.id);
            continue;
        }
        kept.push(event);
    }
    kept
}

/// Converts a candidate into an event if every required field is present
/// and valid.
#[must_use]
pub fn into_event(source: EventSource, candidate: EventCandidate) -> Option<ExternalEvent> {
    let id = non_blank(candidate.id)?;
    let name = non_blank(candidate.name)?;
    let venue_name = non_blank(candidate.venue_name)?;
    let location = candidate.venue_location.filter(|l| l.is_valid())?;
    let start_time = candidate.start_time?;
    let expected_attendees = candidate.expected_attendees?;

    Some(ExternalEvent {
        id,
        name,
        source,
        category: candidate.category.unwrap_or(EventCategory::Other),
        venue: Venue {
            name: venue_name,
            address: non_blank(candidate.venue_address),
            location,
        },
        start_time,
        end_time: candidate.end_time.filter(|end| *end >= start_time),
        expected_attendees,
    })
}

/// Lowercases, strips punctuation, and collapses whitespace.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let no_punct = PUNCTUATION_RE.replace_all(&lower, " ");
    WHITESPACE_RE.replace_all(&no_punct, " ").trim().to_string()
}

/// Same normalized name, starts within the tolerance, and the same venue
/// by name or distance.
fn is_duplicate(a: &ExternalEvent, b: &ExternalEvent, config: &EventsConfig) -> bool {
    let tolerance = TimeDelta::minutes(config.dedup_time_tolerance_minutes);
    if (a.start_time - b.start_time).abs() > tolerance {
        return false;
    }
    if normalize_name(&a.name) != normalize_name(&b.name) {
        return false;
    }
    normalize_name(&a.venue.name) == normalize_name(&b.venue.name)
        || a.venue.location.distance_km(&b.venue.location) <= config.dedup_venue_distance_km
}

/// Attendance descending, then earlier start, then id.
fn by_attendance(a: &ExternalEvent, b: &ExternalEvent) -> Ordering {
    b.expected_attendees
        .cmp(&a.expected_attendees)
        .then_with(|| a.start_time.cmp(&b.start_time))
        .then_with(|| a.id.cmp(&b.id))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
