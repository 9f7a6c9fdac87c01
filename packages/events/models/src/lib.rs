#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for large-event impact analysis.
//!
//! Directory adapters produce loosely-typed [`EventCandidate`]s; only
//! candidates with every required field become [`ExternalEvent`]s, which
//! then flow through camera mapping, risk scoring, and action planning.

use chrono::{DateTime, Utc};
use citypulse_spatial::Location;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Where an event listing came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventSource {
    /// Ticketing platform listings.
    Ticketing,
    /// Public-holiday calendar.
    PublicHoliday,
    /// General web search results.
    WebSearch,
}

/// Coarse event category, used for attendance estimates and historical
/// impact coefficients.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventCategory {
    Sports,
    Concert,
    Festival,
    Conference,
    Holiday,
    Community,
    Other,
}

/// Where an event takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub name: String,
    pub address: Option<String>,
    pub location: Location,
}

/// Raw adapter output. Every field is optional; see
/// [`ExternalEvent`] for what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCandidate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<EventCategory>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub venue_location: Option<Location>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub expected_attendees: Option<u32>,
}

/// A validated large event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEvent {
    /// Source-qualified identifier, e.g. `ticketmaster:vvG1IZ9...`.
    pub id: String,
    pub name: String,
    pub source: EventSource,
    pub category: EventCategory,
    pub venue: Venue,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub expected_attendees: u32,
}

/// A traffic camera known to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRef {
    pub id: String,
    pub location: Location,
    pub street: Option<String>,
}

/// A camera within the mapping radius of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedCamera {
    pub camera: CameraRef,
    /// Great-circle distance from the venue in kilometres.
    pub distance_km: f64,
}

/// Cameras affected by one event, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCameraMapping {
    pub event_id: String,
    pub affected_cameras: Vec<AffectedCamera>,
}

impl EventCameraMapping {
    /// Identifiers of the affected cameras, nearest first.
    #[must_use]
    pub fn camera_ids(&self) -> Vec<String> {
        self.affected_cameras
            .iter()
            .map(|a| a.camera.id.clone())
            .collect()
    }
}

/// Risk tier derived from the score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Raw inputs that went into a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    pub attendee_count: u32,
    /// Hours until the event starts; negative once it has started.
    pub time_to_start_hours: f64,
    /// Hours until the event ends; negative once it has ended.
    pub time_to_end_hours: f64,
    pub current_congestion: f64,
    pub historical_impact: f64,
}

/// The four normalized sub-scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskComponents {
    pub attendance: f64,
    pub proximity: f64,
    pub congestion: f64,
    pub historical: f64,
}

/// Congestion risk for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub event_id: String,
    /// Weighted score in `[0, 100]`.
    pub score: f64,
    pub risk_level: RiskLevel,
    pub factors: RiskFactors,
    pub components: RiskComponents,
    pub affected_cameras: Vec<String>,
}

/// Mitigation action template.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    DeployTrafficControl,
    AlternateRouteSignaling,
    Monitor,
    NoAction,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Concrete mitigation plan for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub action: ActionKind,
    pub priority: Priority,
    pub target_cameras: Vec<String>,
    pub reason: String,
    pub estimated_cost: f64,
    pub public_notification: bool,
}

/// Everything computed for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImpact {
    pub event: ExternalEvent,
    pub mapping: EventCameraMapping,
    pub risk: RiskScore,
    pub plan: ActionPlan,
    /// Optional narrative summary; never affects the numbers above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// A directory that contributed nothing to an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

/// Merged output of every event directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEvents {
    pub events: Vec<ExternalEvent>,
    pub skipped_sources: Vec<SkippedSource>,
}
