#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Optional narrative text for analytics results.
//!
//! A [`NarrativeGenerator`] turns the structured facts of a result into a
//! short briefing. Numeric results never depend on it: [`enrich`] logs and
//! swallows every failure. With no provider configured the
//! [`NoopNarrative`] generator is used and nothing leaves the process.

pub mod providers;

use async_trait::async_trait;
use thiserror::Error;

/// Instructions sent with every request.
pub const SYSTEM_PROMPT: &str = "You write short operational briefings for a city traffic and \
environment control room. Use only the facts provided and do not invent numbers. Reply with at \
most three sentences of plain text.";

/// Errors from narrative generation.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider rejected the request.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Provider selection from the environment failed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// Produces narrative text from structured facts.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    /// Narrative for `facts`, or `None` when the generator has nothing to
    /// say.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError`] if the provider call fails.
    async fn narrate(
        &self,
        title: &str,
        facts: &serde_json::Value,
    ) -> Result<Option<String>, NarrativeError>;
}

/// Generator that never produces text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNarrative;

#[async_trait]
impl NarrativeGenerator for NoopNarrative {
    fn id(&self) -> &str {
        "none"
    }

    async fn narrate(
        &self,
        _title: &str,
        _facts: &serde_json::Value,
    ) -> Result<Option<String>, NarrativeError> {
        Ok(None)
    }
}

/// Builds the user message for `title` and `facts`.
///
/// # Errors
///
/// Returns [`NarrativeError::Json`] if `facts` cannot be rendered.
pub fn user_prompt(title: &str, facts: &serde_json::Value) -> Result<String, NarrativeError> {
    Ok(format!(
        "{title}\n\nFacts (JSON):\n{}",
        serde_json::to_string_pretty(facts)?
    ))
}

/// Runs `generator`, turning any failure into `None`.
pub async fn enrich(
    generator: &dyn NarrativeGenerator,
    title: &str,
    facts: &serde_json::Value,
) -> Option<String> {
    match generator.narrate(title, facts).await {
        Ok(text) => text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            log::warn!("{}: narrative for '{title}' failed: {e}", generator.id());
            None
        }
    }
}
