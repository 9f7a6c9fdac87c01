//! Congestion risk scoring.
//!
//! `score = 100 × Σ weightᵢ × componentᵢ` over four components in `[0, 1]`:
//!
//! * attendance: `ln(1 + attendees) / ln(1 + saturation)`
//! * proximity: 1 while the event runs, 0 once it has ended, otherwise
//!   `1 − hours_until_start / proximity_horizon_hours`
//! * congestion: the current congestion signal near the venue
//! * historical: the category's historical impact coefficient

use chrono::{DateTime, TimeDelta, Utc};
use citypulse_config::{RiskConfig, RiskThresholds};
use citypulse_events_models::{
    EventCameraMapping, ExternalEvent, RiskComponents, RiskFactors, RiskLevel, RiskScore,
};

/// Tier for `score`; thresholds are inclusive lower bounds.
#[must_use]
pub fn level_for(score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if score >= thresholds.critical {
        RiskLevel::Critical
    } else if score >= thresholds.high {
        RiskLevel::High
    } else if score >= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Scores one event at instant `now`.
///
/// `congestion` and `historical_impact` are clamped into `[0, 1]`; a
/// non-finite value counts as 0.
#[must_use]
pub fn score(
    event: &ExternalEvent,
    mapping: &EventCameraMapping,
    congestion: f64,
    historical_impact: f64,
    now: DateTime<Utc>,
    config: &RiskConfig,
) -> RiskScore {
    let end = event.end_time.unwrap_or_else(|| {
        event.start_time + hours_to_delta(config.default_event_duration_hours)
    });
    let time_to_start_hours = hours_between(now, event.start_time);
    let time_to_end_hours = hours_between(now, end);

    let components = RiskComponents {
        attendance: attendance_component(event.expected_attendees, config.attendance_saturation),
        proximity: proximity_component(
            time_to_start_hours,
            time_to_end_hours,
            config.proximity_horizon_hours,
        ),
        congestion: unit(congestion),
        historical: unit(historical_impact),
    };

    let w = &config.weights;
    let weighted = w.attendance * components.attendance
        + w.proximity * components.proximity
        + w.congestion * components.congestion
        + w.historical * components.historical;
    let score = (weighted * 100.0).clamp(0.0, 100.0);

    RiskScore {
        event_id: event.id.clone(),
        score,
        risk_level: level_for(score, &config.thresholds),
        factors: RiskFactors {
            attendee_count: event.expected_attendees,
            time_to_start_hours,
            time_to_end_hours,
            current_congestion: congestion,
            historical_impact,
        },
        components,
        affected_cameras: mapping.camera_ids(),
    }
}

fn attendance_component(attendees: u32, saturation: u32) -> f64 {
    let saturation = f64::from(saturation.max(1));
    unit(f64::from(attendees).ln_1p() / saturation.ln_1p())
}

fn proximity_component(hours_to_start: f64, hours_to_end: f64, horizon_hours: f64) -> f64 {
    if hours_to_end <= 0.0 {
        0.0
    } else if hours_to_start <= 0.0 {
        1.0
    } else {
        unit(1.0 - hours_to_start / horizon_hours)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

#[allow(clippy::cast_possible_truncation)]
fn hours_to_delta(hours: f64) -> TimeDelta {
    TimeDelta::seconds((hours * 3600.0).round() as i64)
}
