//! Internal road network model and travel-time search.
//!
//! Segments carry free-flow speed and a congestion level; travel time over
//! a segment is `length / (free_flow × (1 − congestion × slowdown))`. An
//! estimate snaps both endpoints to their nearest junctions, walks the
//! access legs at `access_speed_kmh`, and runs Dijkstra on travel time
//! between the junctions. Anything the network cannot answer falls back
//! to the straight-line distance times a detour factor.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::path::Path;

use citypulse_config::RoutingConfig;
use citypulse_routing_models::{
    EstimateMethod, InternalEstimate, RoadNetworkDefinition, RoadNode, RouteEstimate,
};
use citypulse_spatial::{Location, distance_km};

use crate::RoutingError;

const BUILTIN_NETWORK: &str = include_str!("../networks/hcmc_core.toml");

/// Seconds to cover `meters` at `kmh`.
#[must_use]
pub fn travel_secs(meters: f64, kmh: f64) -> f64 {
    meters * 3.6 / kmh
}

/// Travel time over a segment given its congestion and the configured
/// slowdown at full congestion.
#[must_use]
pub fn segment_travel_secs(
    length_meters: f64,
    free_flow_kmh: f64,
    congestion: f64,
    slowdown: f64,
) -> f64 {
    travel_secs(length_meters, free_flow_kmh * congestion.mul_add(-slowdown, 1.0))
}

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    length_meters: f64,
    free_flow_kmh: f64,
    congestion: f64,
}

/// A directed road graph between named junctions.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    nodes: Vec<RoadNode>,
    adjacency: Vec<Vec<Edge>>,
    segment_count: usize,
}

impl RoadNetwork {
    /// A network with no junctions; every estimate uses the fallback.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The central Ho Chi Minh City network shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded definition is malformed (this is a
    /// compile-time guarantee since the definition is embedded).
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_NETWORK)
            .unwrap_or_else(|e| panic!("Failed to load built-in road network: {e}"))
    }

    /// Loads the network named by `routing.network_path`, or the built-in
    /// one when unset.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the file cannot be read or is invalid.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, RoutingError> {
        match &config.network_path {
            Some(path) => Self::from_path(Path::new(path)),
            None => Ok(Self::builtin()),
        }
    }

    /// Parses and validates a TOML network definition.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Toml`] for malformed TOML or
    /// [`RoutingError::Network`] for an inconsistent graph.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RoutingError> {
        let definition: RoadNetworkDefinition = toml::from_str(toml_str)?;
        Self::from_definition(definition)
    }

    /// Reads a TOML network definition from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the file cannot be read or is invalid.
    pub fn from_path(path: &Path) -> Result<Self, RoutingError> {
        let contents = std::fs::read_to_string(path)?;
        let network = Self::from_toml_str(&contents)?;
        log::info!(
            "Loaded road network from {}: {} nodes, {} segments",
            path.display(),
            network.node_count(),
            network.segment_count()
        );
        Ok(network)
    }

    /// Builds the graph, rejecting duplicate or invalid junctions, dangling
    /// segment endpoints, and non-physical segment parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Network`] describing the first problem.
    pub fn from_definition(definition: RoadNetworkDefinition) -> Result<Self, RoutingError> {
        let mut index = BTreeMap::new();
        for (i, node) in definition.nodes.iter().enumerate() {
            if !node.location.is_valid() {
                return Err(network_error(format!(
                    "node {} has invalid coordinates",
                    node.id
                )));
            }
            if index.insert(node.id.clone(), i).is_some() {
                return Err(network_error(format!("duplicate node {}", node.id)));
            }
        }

        let mut adjacency = vec![Vec::new(); definition.nodes.len()];
        for segment in &definition.segments {
            let label = format!("{} -> {}", segment.from, segment.to);
            let (Some(&from), Some(&to)) = (index.get(&segment.from), index.get(&segment.to))
            else {
                return Err(network_error(format!("segment {label} names an unknown node")));
            };
            if !(segment.length_meters.is_finite() && segment.length_meters > 0.0) {
                return Err(network_error(format!("segment {label} has a non-positive length")));
            }
            if !(segment.free_flow_kmh.is_finite() && segment.free_flow_kmh > 0.0) {
                return Err(network_error(format!("segment {label} has a non-positive speed")));
            }
            if !(0.0..=1.0).contains(&segment.congestion) {
                return Err(network_error(format!(
                    "segment {label} congestion must be within [0, 1]"
                )));
            }

            let edge = |to| Edge {
                to,
                length_meters: segment.length_meters,
                free_flow_kmh: segment.free_flow_kmh,
                congestion: segment.congestion,
            };
            adjacency[from].push(edge(to));
            if !segment.one_way {
                adjacency[to].push(edge(from));
            }
        }

        Ok(Self {
            nodes: definition.nodes,
            adjacency,
            segment_count: definition.segments.len(),
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segment_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nearest junction to `location` and its distance in kilometres.
    #[must_use]
    pub fn nearest_node(&self, location: Location) -> Option<(&RoadNode, f64)> {
        self.nearest_index(location)
            .map(|(i, km)| (&self.nodes[i], km))
    }

    fn nearest_index(&self, location: Location) -> Option<(usize, f64)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i, distance_km(location, node.location)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Fastest path between two junctions as `(seconds, metres)`, or `None`
    /// when `to` is unreachable.
    fn shortest_path(&self, from: usize, to: usize, slowdown: f64) -> Option<RouteEstimate> {
        let mut best = vec![f64::INFINITY; self.nodes.len()];
        let mut meters = vec![0.0; self.nodes.len()];
        let mut heap = BinaryHeap::new();

        best[from] = 0.0;
        heap.push(State {
            secs: 0.0,
            node: from,
        });

        while let Some(State { secs, node }) = heap.pop() {
            if node == to {
                return Some(RouteEstimate {
                    duration_secs: secs,
                    distance_meters: meters[node],
                });
            }
            if secs > best[node] {
                continue;
            }
            for edge in &self.adjacency[node] {
                let next = secs
                    + segment_travel_secs(
                        edge.length_meters,
                        edge.free_flow_kmh,
                        edge.congestion,
                        slowdown,
                    );
                if next < best[edge.to] {
                    best[edge.to] = next;
                    meters[edge.to] = meters[node] + edge.length_meters;
                    heap.push(State {
                        secs: next,
                        node: edge.to,
                    });
                }
            }
        }

        None
    }

    /// The platform's own estimate from `origin` to `destination`.
    #[must_use]
    pub fn estimate(
        &self,
        origin: Location,
        destination: Location,
        config: &RoutingConfig,
    ) -> InternalEstimate {
        match self.network_estimate(origin, destination, config) {
            Some(estimate) => InternalEstimate {
                estimate,
                method: EstimateMethod::Network,
            },
            None => {
                log::debug!("No network path for {origin} -> {destination}, using straight line");
                InternalEstimate {
                    estimate: straight_line_estimate(origin, destination, config),
                    method: EstimateMethod::StraightLine,
                }
            }
        }
    }

    fn network_estimate(
        &self,
        origin: Location,
        destination: Location,
        config: &RoutingConfig,
    ) -> Option<RouteEstimate> {
        let snap = |location| {
            self.nearest_index(location)
                .filter(|&(_, km)| km <= config.max_snap_distance_km)
        };
        let (start, start_km) = snap(origin)?;
        let (end, end_km) = snap(destination)?;

        let path = self.shortest_path(start, end, config.congestion_slowdown)?;
        let access_meters = (start_km + end_km) * 1000.0;

        Some(RouteEstimate {
            duration_secs: path.duration_secs + travel_secs(access_meters, config.access_speed_kmh),
            distance_meters: path.distance_meters + access_meters,
        })
    }
}

/// Straight-line distance times the detour factor at the fallback speed.
#[must_use]
pub fn straight_line_estimate(
    origin: Location,
    destination: Location,
    config: &RoutingConfig,
) -> RouteEstimate {
    let meters = distance_km(origin, destination) * config.detour_factor * 1000.0;
    RouteEstimate {
        duration_secs: travel_secs(meters, config.fallback_speed_kmh),
        distance_meters: meters,
    }
}

fn network_error(message: String) -> RoutingError {
    RoutingError::Network { message }
}

/// Min-heap entry ordered by travel time, then node index.
#[derive(Debug, Clone, Copy)]
struct State {
    secs: f64,
    node: usize,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .secs
            .total_cmp(&self.secs)
            .then_with(|| other.node.cmp(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use citypulse_routing_models::RoadSegment;

    use super::*;

    fn location(network: &RoadNetwork, id: &str) -> Location {
        network
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.location)
            .unwrap()
    }

    fn node(id: &str, lat: f64, lng: f64) -> RoadNode {
        RoadNode {
            id: id.to_string(),
            location: Location::new(lat, lng),
        }
    }

    fn segment(from: &str, to: &str, length_meters: f64, congestion: f64) -> RoadSegment {
        RoadSegment {
            from: from.to_string(),
            to: to.to_string(),
            length_meters,
            free_flow_kmh: 36.0,
            congestion,
            one_way: false,
        }
    }

    #[test]
    fn builtin_network_loads() {
        let network = RoadNetwork::builtin();
        assert_eq!(network.node_count(), 6);
        assert_eq!(network.segment_count(), 6);
        assert!(!network.is_empty());
    }

    #[test]
    fn segment_time_accounts_for_congestion() {
        assert!((segment_travel_secs(1000.0, 36.0, 0.0, 0.7) - 100.0).abs() < 1e-9);
        // 36 km/h at half congestion with a 0.5 slowdown is 27 km/h.
        assert!((segment_travel_secs(1000.0, 36.0, 0.5, 0.5) - 1000.0 / 7.5).abs() < 1e-9);
    }

    #[test]
    fn picks_the_fastest_path_between_junctions() {
        let network = RoadNetwork::builtin();
        let config = RoutingConfig::default();
        let estimate = network.estimate(
            location(&network, "ben_thanh"),
            location(&network, "notre_dame"),
            &config,
        );
        assert_eq!(estimate.method, EstimateMethod::Network);
        // The direct avenue beats the three-hop detour despite congestion:
        // 40 km/h × (1 − 0.6 × 0.7) = 23.2 km/h over 1 km.
        assert!((estimate.estimate.distance_meters - 1000.0).abs() < 1e-6);
        assert!((estimate.estimate.duration_secs - 3600.0 / 23.2).abs() < 1e-6);
    }

    #[test]
    fn heavy_congestion_reroutes() {
        let definition = RoadNetworkDefinition {
            nodes: vec![
                node("a", 10.770, 106.690),
                node("b", 10.775, 106.695),
                node("c", 10.780, 106.690),
            ],
            segments: vec![
                segment("a", "c", 1000.0, 1.0),
                segment("a", "b", 700.0, 0.0),
                segment("b", "c", 700.0, 0.0),
            ],
        };
        let network = RoadNetwork::from_definition(definition).unwrap();
        let config = RoutingConfig {
            congestion_slowdown: 0.9,
            ..RoutingConfig::default()
        };
        let estimate = network.estimate(
            Location::new(10.770, 106.690),
            Location::new(10.780, 106.690),
            &config,
        );
        // Direct: 1000 m at 3.6 km/h = 1000 s. Around: 1400 m at 36 km/h = 140 s.
        assert!((estimate.estimate.distance_meters - 1400.0).abs() < 1e-6);
        assert!((estimate.estimate.duration_secs - 140.0).abs() < 1e-6);
    }

    #[test]
    fn one_way_segments_are_respected() {
        let network = RoadNetwork::builtin();
        let config = RoutingConfig::default();
        let lake = location(&network, "turtle_lake");
        let tan_dinh = location(&network, "tan_dinh");

        let forward = network.estimate(lake, tan_dinh, &config);
        assert_eq!(forward.method, EstimateMethod::Network);
        assert!((forward.estimate.distance_meters - 1100.0).abs() < 1e-6);

        let backward = network.estimate(tan_dinh, lake, &config);
        assert_eq!(backward.method, EstimateMethod::StraightLine);
    }

    #[test]
    fn off_node_endpoints_add_access_legs() {
        let network = RoadNetwork::builtin();
        let config = RoutingConfig::default();
        let at_node = network.estimate(
            location(&network, "ben_thanh"),
            location(&network, "notre_dame"),
            &config,
        );
        let nearby = network.estimate(
            Location::new(10.7715, 106.6975),
            location(&network, "notre_dame"),
            &config,
        );
        assert_eq!(nearby.method, EstimateMethod::Network);
        assert!(nearby.estimate.distance_meters > at_node.estimate.distance_meters);
        assert!(nearby.estimate.duration_secs > at_node.estimate.duration_secs);
    }

    #[test]
    fn distant_endpoints_fall_back_to_straight_line() {
        let network = RoadNetwork::builtin();
        let config = RoutingConfig::default();
        let origin = Location::new(10.7769, 106.7009);
        let hanoi = Location::new(21.0285, 105.8542);
        let estimate = network.estimate(origin, hanoi, &config);
        assert_eq!(estimate.method, EstimateMethod::StraightLine);
        assert_eq!(
            estimate.estimate,
            straight_line_estimate(origin, hanoi, &config)
        );
    }

    #[test]
    fn empty_network_uses_detour_factor_and_fallback_speed() {
        let config = RoutingConfig::default();
        let origin = Location::new(10.7725, 106.6980);
        let destination = Location::new(10.7890, 106.6905);
        let estimate = RoadNetwork::empty().estimate(origin, destination, &config);

        let expected_meters = distance_km(origin, destination) * 1.3 * 1000.0;
        assert_eq!(estimate.method, EstimateMethod::StraightLine);
        assert!((estimate.estimate.distance_meters - expected_meters).abs() < 1e-6);
        assert!(
            (estimate.estimate.duration_secs - expected_meters * 3.6 / 30.0).abs() < 1e-6
        );
    }

    #[test]
    fn rejects_segments_to_unknown_nodes() {
        let definition = RoadNetworkDefinition {
            nodes: vec![node("a", 10.77, 106.69)],
            segments: vec![segment("a", "nowhere", 100.0, 0.0)],
        };
        assert!(matches!(
            RoadNetwork::from_definition(definition),
            Err(RoutingError::Network { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_nodes_and_bad_congestion() {
        let duplicate = RoadNetworkDefinition {
            nodes: vec![node("a", 10.77, 106.69), node("a", 10.78, 106.69)],
            segments: Vec::new(),
        };
        assert!(RoadNetwork::from_definition(duplicate).is_err());

        let congested = RoadNetworkDefinition {
            nodes: vec![node("a", 10.77, 106.69), node("b", 10.78, 106.69)],
            segments: vec![segment("a", "b", 100.0, 1.5)],
        };
        assert!(RoadNetwork::from_definition(congested).is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            RoadNetwork::from_toml_str("[[nodes]]\nid = 3"),
            Err(RoutingError::Toml(_))
        ));
    }
}
