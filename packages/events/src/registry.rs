//! Compile-time registry of event directory definitions.
//!
//! Each directory is defined in a TOML file under `directories/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_directories`] and [`enabled_directories`]; [`build_directories`]
//! turns definitions into live adapters.

use std::sync::Arc;
use std::time::Duration;

use citypulse_config::AnalyticsConfig;
use citypulse_provider::credentials::shared_pool;
use serde::Deserialize;

use crate::directories::holidays::PublicHolidayDirectory;
use crate::directories::ticketmaster::TicketmasterDirectory;
use crate::directories::web_search::WebSearchDirectory;
use crate::directory::EventDirectory;

/// An event directory definition loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryDefinition {
    /// Unique identifier (e.g., `"ticketmaster"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this directory is queried.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-directory timeout; falls back to
    /// `events.default_source_timeout_ms`.
    pub timeout_ms: Option<u64>,
    /// Provider-specific configuration.
    pub provider: DirectoryProvider,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryProvider {
    /// Ticketmaster Discovery API v2.
    Ticketmaster {
        /// `events.json` endpoint.
        base_url: String,
        /// Env var holding comma-separated API keys.
        api_keys_env: String,
        /// Listings per request.
        #[serde(default = "default_page_size")]
        page_size: u32,
    },
    /// Nager.Date public holidays.
    NagerDate {
        /// `PublicHolidays` endpoint; `/{year}/{country}` is appended.
        base_url: String,
    },
    /// SerpApi Google Events.
    SerpApi {
        /// `search.json` endpoint.
        base_url: String,
        /// Env var holding comma-separated API keys.
        api_keys_env: String,
        /// Search query; `{area}` is replaced by the area name.
        query_template: String,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_page_size() -> u32 {
    100
}

impl DirectoryDefinition {
    /// The provider's endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            DirectoryProvider::Ticketmaster { base_url, .. }
            | DirectoryProvider::NagerDate { base_url }
            | DirectoryProvider::SerpApi { base_url, .. } => base_url,
        }
    }

    /// Env var holding API keys, for keyed providers.
    #[must_use]
    pub fn api_keys_env(&self) -> Option<&str> {
        match &self.provider {
            DirectoryProvider::Ticketmaster { api_keys_env, .. }
            | DirectoryProvider::SerpApi { api_keys_env, .. } => Some(api_keys_env),
            DirectoryProvider::NagerDate { .. } => None,
        }
    }

    /// Per-directory timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const DIRECTORY_TOMLS: &[(&str, &str)] = &[
    (
        "ticketmaster",
        include_str!("../directories/ticketmaster.toml"),
    ),
    (
        "public_holidays",
        include_str!("../directories/public_holidays.toml"),
    ),
    ("web_search", include_str!("../directories/web_search.toml")),
];

#[cfg(test)]
const EXPECTED_DIRECTORY_COUNT: usize = 3;

/// Returns all directory definitions (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML definition is malformed (this is a compile-time
/// guarantee since the definitions are embedded).
#[must_use]
pub fn all_directories() -> Vec<DirectoryDefinition> {
    DIRECTORY_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse event directory '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled directories.
#[must_use]
pub fn enabled_directories() -> Vec<DirectoryDefinition> {
    all_directories().into_iter().filter(|d| d.enabled).collect()
}

/// Builds live adapters for `definitions`.
///
/// Keyed directories whose key variable is unset are skipped with a
/// warning.
#[must_use]
pub fn build_directories(
    definitions: &[DirectoryDefinition],
    client: &reqwest::Client,
    config: &AnalyticsConfig,
) -> Vec<Arc<dyn EventDirectory>> {
    let cooldown = config.providers.credential_cooldown();
    let mut directories: Vec<Arc<dyn EventDirectory>> = Vec::new();

    for def in definitions {
        let timeout = def.timeout();
        match &def.provider {
            DirectoryProvider::Ticketmaster {
                base_url,
                api_keys_env,
                page_size,
            } => {
                let Some(pool) = shared_pool(&def.id, api_keys_env, cooldown) else {
                    log::warn!("{}: {api_keys_env} not set, directory disabled", def.id);
                    continue;
                };
                directories.push(Arc::new(TicketmasterDirectory::new(
                    def.id.clone(),
                    client.clone(),
                    base_url.clone(),
                    pool,
                    config.providers.clone(),
                    config.events.clone(),
                    *page_size,
                    timeout,
                )));
            }
            DirectoryProvider::NagerDate { base_url } => {
                directories.push(Arc::new(PublicHolidayDirectory::new(
                    def.id.clone(),
                    client.clone(),
                    base_url.clone(),
                    config.providers.clone(),
                    config.events.clone(),
                    timeout,
                )));
            }
            DirectoryProvider::SerpApi {
                base_url,
                api_keys_env,
                query_template,
            } => {
                let Some(pool) = shared_pool(&def.id, api_keys_env, cooldown) else {
                    log::warn!("{}: {api_keys_env} not set, directory disabled", def.id);
                    continue;
                };
                directories.push(Arc::new(WebSearchDirectory::new(
                    def.id.clone(),
                    client.clone(),
                    base_url.clone(),
                    pool,
                    config.providers.clone(),
                    config.events.clone(),
                    query_template.clone(),
                    timeout,
                )));
            }
        }
    }

    log::info!(
        "Event directories: {}",
        directories
            .iter()
            .map(|d| d.id())
            .collect::<Vec<_>>()
            .join(", ")
    );
    directories
}
