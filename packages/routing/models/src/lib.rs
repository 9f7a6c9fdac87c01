#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route benchmark and road network types.

use citypulse_spatial::Location;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Travel time and distance for one route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEstimate {
    pub duration_secs: f64,
    pub distance_meters: f64,
}

/// How the internal estimate was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EstimateMethod {
    /// Shortest travel-time path over the road network.
    Network,
    /// Straight-line distance with a detour factor.
    StraightLine,
}

/// Internal estimate and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalEstimate {
    pub estimate: RouteEstimate,
    pub method: EstimateMethod,
}

/// Which side of the comparison is faster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteVerdict {
    InternalFaster,
    InternalSlower,
    Comparable,
}

/// External versus internal estimate for one origin and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteComparison {
    pub origin: Location,
    pub destination: Location,
    /// Provider that produced the external estimate.
    pub external_provider: String,
    /// Seconds.
    pub external_duration: f64,
    /// Metres.
    pub external_distance: f64,
    /// Seconds.
    pub internal_duration: f64,
    /// Metres.
    pub internal_distance: f64,
    pub internal_method: EstimateMethod,
    /// `(internal − external) / external × 100`. Negative means the
    /// internal estimate is faster.
    pub optimization_gap: f64,
    pub verdict: RouteVerdict,
    pub recommendation: String,
}

/// A named junction in the internal road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub id: String,
    #[serde(flatten)]
    pub location: Location,
}

/// A road segment between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub from: String,
    pub to: String,
    pub length_meters: f64,
    pub free_flow_kmh: f64,
    /// Current congestion in `[0, 1]`.
    #[serde(default)]
    pub congestion: f64,
    #[serde(default)]
    pub one_way: bool,
}

/// Serialized form of a road network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadNetworkDefinition {
    #[serde(default)]
    pub nodes: Vec<RoadNode>,
    #[serde(default)]
    pub segments: Vec<RoadSegment>,
}
