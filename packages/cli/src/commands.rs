//! Subcommand implementations.

use std::error::Error;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use citypulse_air_quality::open_meteo::OpenMeteoClient;
use citypulse_air_quality::service::DispersionService;
use citypulse_air_quality_models::DispersionSimulation;
use citypulse_broker::BROKER_URL_ENV;
use citypulse_broker::client::ContextBrokerClient;
use citypulse_config::AnalyticsConfig;
use citypulse_events::analyze::EventImpactAnalyzer;
use citypulse_events::registry::{all_directories, build_directories, enabled_directories};
use citypulse_narrative::enrich;
use citypulse_narrative::providers::create_from_env;
use citypulse_provider::credentials::shared_pool;
use citypulse_routing::benchmark::RouteBenchmarker;
use citypulse_routing::google::{self, GoogleDirectionsClient};
use citypulse_routing::network::RoadNetwork;
use citypulse_spatial::Location;
use serde::Serialize;

type CommandResult = Result<(), Box<dyn Error>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ForecastOutput {
    #[serde(flatten)]
    simulation: DispersionSimulation,
    #[serde(skip_serializing_if = "Option::is_none")]
    narrative: Option<String>,
}

fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("citypulse/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn broker(client: &reqwest::Client, config: &AnalyticsConfig) -> Result<ContextBrokerClient, String> {
    ContextBrokerClient::from_env(
        client.clone(),
        config.providers.clone(),
        config.dispersion.station_radius_km,
    )
    .ok_or_else(|| format!("{BROKER_URL_ENV} is not set"))
}

fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn forecast(config: AnalyticsConfig, location: Location, narrate: bool) -> CommandResult {
    let config = Arc::new(config);
    let client = http_client()?;
    let readings = broker(&client, &config)?;
    let weather = OpenMeteoClient::public(client, config.providers.clone());

    let service = DispersionService::new(Arc::new(weather), Arc::new(readings), Arc::clone(&config));
    let simulation = service.simulate(location).await?;

    let narrative = if narrate {
        let generator = create_from_env()?;
        let facts = serde_json::to_value(&simulation)?;
        enrich(generator.as_ref(), "Air quality outlook", &facts).await
    } else {
        None
    };

    print_json(&ForecastOutput {
        simulation,
        narrative,
    })
}

pub async fn events(
    config: AnalyticsConfig,
    center: Location,
    hours: Option<u32>,
    narrate: bool,
) -> CommandResult {
    let config = Arc::new(config);
    let client = http_client()?;
    let broker = Arc::new(broker(&client, &config)?);
    let directories = build_directories(&enabled_directories(), &client, &config);

    let analyzer =
        EventImpactAnalyzer::new(directories, broker.clone(), broker, Arc::clone(&config));

    let now = Utc::now();
    let mut query = analyzer.query_for(center, now);
    if let Some(hours) = hours {
        query.to = now + TimeDelta::hours(i64::from(hours));
    }
    let mut report = analyzer.analyze(&query, now).await?;

    if narrate {
        let generator = create_from_env()?;
        for impact in &mut report.impacts {
            let facts = serde_json::to_value(&*impact)?;
            impact.narrative = enrich(generator.as_ref(), &impact.event.name, &facts).await;
        }
    }

    print_json(&report)
}

pub async fn route(config: AnalyticsConfig, from: Location, to: Location) -> CommandResult {
    let client = http_client()?;
    let pool = shared_pool(
        google::PROVIDER_ID,
        google::API_KEYS_ENV,
        config.providers.credential_cooldown(),
    )
    .ok_or_else(|| format!("{} is not set", google::API_KEYS_ENV))?;

    let provider = GoogleDirectionsClient::new(
        client,
        google::DEFAULT_BASE_URL.to_string(),
        pool,
        config.providers.clone(),
    );
    let network = RoadNetwork::from_config(&config.routing)?;

    let benchmarker = RouteBenchmarker::new(
        Arc::new(provider),
        Arc::new(network),
        Arc::new(config.routing),
    );
    print_json(&benchmarker.benchmark(from, to).await?)
}

pub fn directories() {
    println!("{:<24} {:<8} NAME", "ID", "ENABLED");
    println!("{}", "-".repeat(60));
    for def in &all_directories() {
        println!("{:<24} {:<8} {}", def.id, def.enabled, def.name);
    }
}
