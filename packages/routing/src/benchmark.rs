//! External versus internal route comparison.

use std::sync::Arc;

use citypulse_config::RoutingConfig;
use citypulse_provider::with_timeout;
use citypulse_routing_models::{InternalEstimate, RouteComparison, RouteEstimate, RouteVerdict};
use citypulse_spatial::Location;

use crate::RoutingError;
use crate::network::RoadNetwork;
use crate::provider::RoutingProvider;

/// Verdict for `gap` percent given a `threshold` band around zero.
///
/// The band is inclusive: a gap of exactly `±threshold` is comparable.
#[must_use]
pub fn verdict_for(gap: f64, threshold: f64) -> RouteVerdict {
    if gap < -threshold {
        RouteVerdict::InternalFaster
    } else if gap > threshold {
        RouteVerdict::InternalSlower
    } else {
        RouteVerdict::Comparable
    }
}

fn recommendation(verdict: RouteVerdict, gap: f64, provider: &str, threshold: f64) -> String {
    match verdict {
        RouteVerdict::InternalFaster => format!(
            "Internal estimate is {:.1}% faster than {provider}; the internal road model \
             finds a quicker route and can be preferred for this trip",
            gap.abs()
        ),
        RouteVerdict::InternalSlower => format!(
            "Internal estimate is {gap:.1}% slower than {provider}; review segment speeds \
             and congestion on this corridor"
        ),
        RouteVerdict::Comparable => format!(
            "Internal estimate is within {threshold:.0}% of {provider} ({gap:+.1}%); \
             no routing change needed"
        ),
    }
}

/// Builds the comparison for one origin and destination.
///
/// # Errors
///
/// Returns [`RoutingError::BenchmarkUnavailable`] if the external duration
/// is not a positive number, since the gap is undefined.
pub fn compare(
    origin: Location,
    destination: Location,
    provider: &str,
    external: RouteEstimate,
    internal: InternalEstimate,
    config: &RoutingConfig,
) -> Result<RouteComparison, RoutingError> {
    if !(external.duration_secs.is_finite() && external.duration_secs > 0.0) {
        return Err(RoutingError::BenchmarkUnavailable {
            provider: provider.to_string(),
            reason: format!(
                "external duration {} is not positive",
                external.duration_secs
            ),
        });
    }

    let gap = (internal.estimate.duration_secs - external.duration_secs) / external.duration_secs
        * 100.0;
    let verdict = verdict_for(gap, config.comparable_gap_percent);

    Ok(RouteComparison {
        origin,
        destination,
        external_provider: provider.to_string(),
        external_duration: external.duration_secs,
        external_distance: external.distance_meters,
        internal_duration: internal.estimate.duration_secs,
        internal_distance: internal.estimate.distance_meters,
        internal_method: internal.method,
        optimization_gap: gap,
        verdict,
        recommendation: recommendation(verdict, gap, provider, config.comparable_gap_percent),
    })
}

/// Compares an external routing provider with the internal road network.
pub struct RouteBenchmarker {
    provider: Arc<dyn RoutingProvider>,
    network: Arc<RoadNetwork>,
    config: Arc<RoutingConfig>,
}

impl RouteBenchmarker {
    #[must_use]
    pub fn new(
        provider: Arc<dyn RoutingProvider>,
        network: Arc<RoadNetwork>,
        config: Arc<RoutingConfig>,
    ) -> Self {
        Self {
            provider,
            network,
            config,
        }
    }

    /// Benchmarks the route from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// * [`RoutingError::InvalidInput`] if either coordinate is invalid.
    /// * [`RoutingError::BenchmarkUnavailable`] if the external provider
    ///   fails, times out, or returns a non-positive duration.
    pub async fn benchmark(
        &self,
        origin: Location,
        destination: Location,
    ) -> Result<RouteComparison, RoutingError> {
        origin.validate()?;
        destination.validate()?;

        let provider = self.provider.id();
        let external = with_timeout(
            provider,
            self.config.external_timeout(),
            self.provider.route(origin, destination),
        )
        .await
        .map_err(|e| {
            log::warn!("{provider}: route {origin} -> {destination} unavailable: {e}");
            RoutingError::BenchmarkUnavailable {
                provider: provider.to_string(),
                reason: e.to_string(),
            }
        })?;

        let internal = self.network.estimate(origin, destination, &self.config);
        let comparison = compare(
            origin,
            destination,
            provider,
            external,
            internal,
            &self.config,
        )?;

        log::info!(
            "Route {origin} -> {destination}: {provider} {:.0}s, internal {:.0}s ({}), gap {:+.1}%",
            comparison.external_duration,
            comparison.internal_duration,
            comparison.internal_method,
            comparison.optimization_gap
        );
        Ok(comparison)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use citypulse_provider::ProviderError;
    use citypulse_routing_models::EstimateMethod;

    use super::*;
    use crate::provider::RouteProviderError;

    fn origin() -> Location {
        Location::new(10.7725, 106.6980)
    }

    fn destination() -> Location {
        Location::new(10.7890, 106.6905)
    }

    fn internal(duration_secs: f64) -> InternalEstimate {
        InternalEstimate {
            estimate: RouteEstimate {
                duration_secs,
                distance_meters: 2600.0,
            },
            method: EstimateMethod::Network,
        }
    }

    fn external(duration_secs: f64) -> RouteEstimate {
        RouteEstimate {
            duration_secs,
            distance_meters: 2800.0,
        }
    }

    enum Reply {
        Route(RouteEstimate),
        RateLimited,
        Hang,
    }

    struct FakeProvider {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RoutingProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake_directions"
        }

        async fn route(
            &self,
            _origin: Location,
            _destination: Location,
        ) -> Result<RouteEstimate, RouteProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Route(estimate) => Ok(*estimate),
                Reply::RateLimited => Err(ProviderError::RateLimited {
                    provider: "fake_directions".to_string(),
                    attempts: 3,
                }
                .into()),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(external(1.0))
                }
            }
        }
    }

    fn benchmarker(provider: Arc<FakeProvider>) -> RouteBenchmarker {
        let config = RoutingConfig {
            external_timeout_ms: 50,
            ..RoutingConfig::default()
        };
        RouteBenchmarker::new(provider, Arc::new(RoadNetwork::empty()), Arc::new(config))
    }

    #[test]
    fn internal_twenty_percent_lower_is_flagged_faster() {
        let comparison = compare(
            origin(),
            destination(),
            "google_directions",
            external(1000.0),
            internal(800.0),
            &RoutingConfig::default(),
        )
        .unwrap();
        assert!((comparison.optimization_gap + 20.0).abs() < 1e-9);
        assert_eq!(comparison.verdict, RouteVerdict::InternalFaster);
        assert!(comparison.recommendation.contains("20.0% faster"));
    }

    #[test]
    fn verdict_bands() {
        assert_eq!(verdict_for(-10.0, 10.0), RouteVerdict::Comparable);
        assert_eq!(verdict_for(10.0, 10.0), RouteVerdict::Comparable);
        assert_eq!(verdict_for(0.0, 10.0), RouteVerdict::Comparable);
        assert_eq!(verdict_for(-10.5, 10.0), RouteVerdict::InternalFaster);
        assert_eq!(verdict_for(25.0, 10.0), RouteVerdict::InternalSlower);
    }

    #[test]
    fn slower_internal_estimate_asks_for_review() {
        let comparison = compare(
            origin(),
            destination(),
            "google_directions",
            external(600.0),
            internal(900.0),
            &RoutingConfig::default(),
        )
        .unwrap();
        assert!((comparison.optimization_gap - 50.0).abs() < 1e-9);
        assert_eq!(comparison.verdict, RouteVerdict::InternalSlower);
        assert!(comparison.recommendation.contains("slower"));
    }

    #[test]
    fn zero_external_duration_has_no_comparison() {
        let result = compare(
            origin(),
            destination(),
            "google_directions",
            external(0.0),
            internal(800.0),
            &RoutingConfig::default(),
        );
        assert!(matches!(
            result,
            Err(RoutingError::BenchmarkUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn gap_matches_reported_durations() {
        let benchmarker = benchmarker(FakeProvider::new(Reply::Route(external(300.0))));
        let comparison = benchmarker.benchmark(origin(), destination()).await.unwrap();

        assert_eq!(comparison.external_provider, "fake_directions");
        assert_eq!(comparison.internal_method, EstimateMethod::StraightLine);
        let recomputed = (comparison.internal_duration - comparison.external_duration)
            / comparison.external_duration
            * 100.0;
        assert!((comparison.optimization_gap - recomputed).abs() < 1e-9);
    }

    #[tokio::test]
    async fn provider_failure_is_unavailable() {
        let benchmarker = benchmarker(FakeProvider::new(Reply::RateLimited));
        let err = benchmarker
            .benchmark(origin(), destination())
            .await
            .unwrap_err();
        let RoutingError::BenchmarkUnavailable { provider, reason } = err else {
            panic!("expected BenchmarkUnavailable");
        };
        assert_eq!(provider, "fake_directions");
        assert!(reason.contains("rate limited"));
    }

    #[tokio::test]
    async fn provider_timeout_is_unavailable() {
        let benchmarker = benchmarker(FakeProvider::new(Reply::Hang));
        let err = benchmarker
            .benchmark(origin(), destination())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::BenchmarkUnavailable { reason, .. } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn non_positive_external_duration_is_unavailable() {
        let benchmarker = benchmarker(FakeProvider::new(Reply::Route(external(-5.0))));
        assert!(matches!(
            benchmarker.benchmark(origin(), destination()).await,
            Err(RoutingError::BenchmarkUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_coordinates_skip_the_provider() {
        let provider = FakeProvider::new(Reply::Route(external(300.0)));
        let benchmarker = benchmarker(Arc::clone(&provider));
        let result = benchmarker
            .benchmark(Location::new(95.0, 106.0), destination())
            .await;
        assert!(matches!(result, Err(RoutingError::InvalidInput { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
