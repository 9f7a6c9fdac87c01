//! End-to-end event impact analysis against live collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use citypulse_config::AnalyticsConfig;
use citypulse_events_models::{CameraRef, EventImpact, SkippedSource};
use citypulse_provider::{ProviderError, with_timeout};
use citypulse_spatial::Location;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::EventError;
use crate::action::plan;
use crate::aggregate::aggregate;
use crate::directory::{EventDirectory, EventQuery};
use crate::mapping::map_cameras;
use crate::risk::score;

/// Errors from camera and congestion lookups.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Transport, status, or timeout failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The source returned data that could not be interpreted.
    #[error("Sensor data parse error: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
    },
}

/// The set of traffic cameras known to the platform.
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    /// Lists every camera.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] if the lookup fails.
    async fn cameras(&self) -> Result<Vec<CameraRef>, SensorError>;
}

/// Current congestion near a set of cameras.
#[async_trait]
pub trait CongestionSource: Send + Sync {
    /// Short identifier used in logs and timeouts.
    fn id(&self) -> &str;

    /// Mean congestion in `[0, 1]` across `camera_ids`; `0.0` when none
    /// report.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] if the lookup fails.
    async fn congestion(&self, camera_ids: &[String]) -> Result<f64, SensorError>;
}

/// Result of [`EventImpactAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImpactReport {
    /// Impacts ordered by risk score, highest first.
    pub impacts: Vec<EventImpact>,
    /// Sources that contributed nothing.
    pub skipped_sources: Vec<SkippedSource>,
}

/// Runs aggregation, mapping, scoring, and planning.
pub struct EventImpactAnalyzer {
    directories: Vec<Arc<dyn EventDirectory>>,
    cameras: Arc<dyn CameraDirectory>,
    congestion: Arc<dyn CongestionSource>,
    config: Arc<AnalyticsConfig>,
}

impl EventImpactAnalyzer {
    #[must_use]
    pub fn new(
        directories: Vec<Arc<dyn EventDirectory>>,
        cameras: Arc<dyn CameraDirectory>,
        congestion: Arc<dyn CongestionSource>,
        config: Arc<AnalyticsConfig>,
    ) -> Self {
        Self {
            directories,
            cameras,
            congestion,
            config,
        }
    }

    /// Builds the default query for `center` starting at `now`, using the
    /// configured search radius and lookahead.
    #[must_use]
    pub fn query_for(&self, center: Location, now: DateTime<Utc>) -> EventQuery {
        EventQuery {
            center,
            radius_km: self.config.events.search_radius_km,
            from: now,
            to: now + TimeDelta::hours(i64::from(self.config.events.lookahead_hours)),
        }
    }

    /// Analyzes every large event matching `query`, scoring at `now`.
    ///
    /// A failed camera lookup leaves every event unmapped and is reported
    /// as a skipped source. A failed congestion lookup counts as zero
    /// baseline congestion.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidInput`] for an invalid query.
    pub async fn analyze(
        &self,
        query: &EventQuery,
        now: DateTime<Utc>,
    ) -> Result<EventImpactReport, EventError> {
        let config = &self.config;
        let camera_timeout = config.events.default_source_timeout();

        let (aggregated, cameras) = tokio::join!(
            aggregate(&self.directories, query, &config.events),
            with_timeout(self.cameras.id(), camera_timeout, self.cameras.cameras()),
        );
        let aggregated = aggregated?;
        let mut skipped_sources = aggregated.skipped_sources;

        let cameras = cameras.unwrap_or_else(|e| {
            log::warn!("{}: camera lookup failed: {e}", self.cameras.id());
            skipped_sources.push(SkippedSource {
                source: self.cameras.id().to_string(),
                reason: e.to_string(),
            });
            Vec::new()
        });
        log::info!(
            "Analyzing {} events against {} cameras",
            aggregated.events.len(),
            cameras.len()
        );

        let mapped: Vec<_> = aggregated
            .events
            .into_iter()
            .map(|event| {
                let mapping = map_cameras(&event, &cameras, config.events.mapping_radius_km);
                (event, mapping)
            })
            .collect();

        // Concurrent, each under its own timeout.
        let baselines = join_all(
            mapped
                .iter()
                .map(|(_, mapping)| self.baseline_congestion(mapping.camera_ids())),
        )
        .await;

        let mut impacts: Vec<EventImpact> = mapped
            .into_iter()
            .zip(baselines)
            .map(|((event, mapping), congestion)| {
                let historical = config.risk.historical_impact_for(event.category.as_ref());
                let risk = score(&event, &mapping, congestion, historical, now, &config.risk);
                let plan = plan(&risk, &mapping, &config.actions);
                EventImpact {
                    event,
                    mapping,
                    risk,
                    plan,
                    narrative: None,
                }
            })
            .collect();

        impacts.sort_by(|a, b| {
            b.risk
                .score
                .total_cmp(&a.risk.score)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });

        Ok(EventImpactReport {
            impacts,
            skipped_sources,
        })
    }

    async fn baseline_congestion(&self, camera_ids: Vec<String>) -> f64 {
        if camera_ids.is_empty() {
            return 0.0;
        }
        match with_timeout(
            self.congestion.id(),
            self.config.risk.congestion_timeout(),
            self.congestion.congestion(&camera_ids),
        )
        .await
        {
            Ok(level) => level,
            Err(e) => {
                log::warn!(
                    "{}: congestion lookup failed, assuming none: {e}",
                    self.congestion.id()
                );
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use citypulse_events_models::{
        ActionKind, EventCandidate, EventCategory, EventSource, RiskLevel,
    };

    use super::*;
    use crate::directory::DirectoryError;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stadium() -> Location {
        Location::new(10.7603, 106.6633)
    }

    struct Listings(Vec<EventCandidate>);

    #[async_trait]
    impl EventDirectory for Listings {
        fn id(&self) -> &str {
            "listings"
        }

        fn source(&self) -> EventSource {
            EventSource::Ticketing
        }

        async fn search(&self, _query: &EventQuery) -> Result<Vec<EventCandidate>, DirectoryError> {
            Ok(self.0.clone())
        }
    }

    struct Cameras(Option<Vec<CameraRef>>);

    #[async_trait]
    impl CameraDirectory for Cameras {
        fn id(&self) -> &str {
            "cameras"
        }

        async fn cameras(&self) -> Result<Vec<CameraRef>, SensorError> {
            self.0.clone().ok_or_else(|| SensorError::Parse {
                message: "broker down".to_string(),
            })
        }
    }

    struct Congestion {
        level: f64,
        hang: bool,
    }

    #[async_trait]
    impl CongestionSource for Congestion {
        fn id(&self) -> &str {
            "congestion"
        }

        async fn congestion(&self, _camera_ids: &[String]) -> Result<f64, SensorError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(self.level)
        }
    }

    fn listing(id: &str, attendees: u32, hours: i64, category: EventCategory) -> EventCandidate {
        EventCandidate {
            id: Some(id.to_string()),
            name: Some(format!("Event {id}")),
            category: Some(category),
            venue_name: Some(format!("Venue {id}")),
            venue_address: None,
            venue_location: Some(stadium()),
            start_time: Some(now() + TimeDelta::hours(hours)),
            end_time: None,
            expected_attendees: Some(attendees),
        }
    }

    fn cameras() -> Vec<CameraRef> {
        vec![
            CameraRef {
                id: "cam-near".to_string(),
                location: Location::new(10.7610, 106.6640),
                street: None,
            },
            CameraRef {
                id: "cam-far".to_string(),
                location: Location::new(10.8500, 106.7700),
                street: None,
            },
        ]
    }

    fn analyzer(
        listings: Vec<EventCandidate>,
        cams: Option<Vec<CameraRef>>,
        congestion: Congestion,
    ) -> EventImpactAnalyzer {
        let mut config = AnalyticsConfig::default();
        config.risk.congestion_timeout_ms = 50;
        EventImpactAnalyzer::new(
            vec![Arc::new(Listings(listings))],
            Arc::new(Cameras(cams)),
            Arc::new(congestion),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn critical_event_gets_traffic_control() {
        let analyzer = analyzer(
            vec![
                listing("big", 50_000, 2, EventCategory::Sports),
                listing("small", 6_000, 30, EventCategory::Conference),
            ],
            Some(cameras()),
            Congestion {
                level: 0.0,
                hang: false,
            },
        );
        let query = analyzer.query_for(Location::new(10.7769, 106.7009), now());
        let report = analyzer.analyze(&query, now()).await.unwrap();

        assert_eq!(report.impacts.len(), 2);
        let top = &report.impacts[0];
        assert_eq!(top.event.id, "big");
        assert_eq!(top.risk.risk_level, RiskLevel::Critical);
        assert_eq!(top.plan.action, ActionKind::DeployTrafficControl);
        assert_eq!(top.plan.target_cameras, ["cam-near"]);
        assert!(report.impacts[1].risk.score < top.risk.score);
        assert!(report.skipped_sources.is_empty());
    }

    #[tokio::test]
    async fn camera_failure_is_reported_and_events_still_scored() {
        let analyzer = analyzer(
            vec![listing("big", 50_000, 2, EventCategory::Sports)],
            None,
            Congestion {
                level: 0.0,
                hang: false,
            },
        );
        let query = analyzer.query_for(Location::new(10.7769, 106.7009), now());
        let report = analyzer.analyze(&query, now()).await.unwrap();
        assert_eq!(report.impacts.len(), 1);
        assert!(report.impacts[0].mapping.affected_cameras.is_empty());
        assert_eq!(report.skipped_sources[0].source, "cameras");
    }

    #[tokio::test]
    async fn slow_congestion_counts_as_zero() {
        let analyzer = analyzer(
            vec![listing("big", 30_000, 4, EventCategory::Concert)],
            Some(cameras()),
            Congestion {
                level: 0.9,
                hang: true,
            },
        );
        let query = analyzer.query_for(Location::new(10.7769, 106.7009), now());
        let report = analyzer.analyze(&query, now()).await.unwrap();
        assert!(report.impacts[0].risk.components.congestion.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn congestion_lookups_run_concurrently() {
        let listings = (0..6)
            .map(|i| listing(&format!("e{i}"), 20_000, 3, EventCategory::Concert))
            .collect();
        let analyzer = analyzer(
            listings,
            Some(cameras()),
            Congestion {
                level: 0.5,
                hang: true,
            },
        );
        let query = analyzer.query_for(Location::new(10.7769, 106.7009), now());

        let started = tokio::time::Instant::now();
        let report = analyzer.analyze(&query, now()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.impacts.len(), 6);
        assert!(
            report
                .impacts
                .iter()
                .all(|impact| impact.risk.components.congestion.abs() < f64::EPSILON)
        );
        // Six serial lookups would take 300ms at a 50ms timeout.
        assert!(elapsed < Duration::from_millis(100), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn congestion_raises_the_score() {
        let quiet = analyzer(
            vec![listing("big", 30_000, 4, EventCategory::Concert)],
            Some(cameras()),
            Congestion {
                level: 0.0,
                hang: false,
            },
        );
        let busy = analyzer(
            vec![listing("big", 30_000, 4, EventCategory::Concert)],
            Some(cameras()),
            Congestion {
                level: 0.8,
                hang: false,
            },
        );
        let query = quiet.query_for(Location::new(10.7769, 106.7009), now());
        let quiet = quiet.analyze(&query, now()).await.unwrap();
        let busy = busy.analyze(&query, now()).await.unwrap();
        assert!(busy.impacts[0].risk.score > quiet.impacts[0].risk.score);
    }
}
