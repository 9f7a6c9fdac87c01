//! LLM-backed generators and environment-driven selection.
//!
//! Supports Anthropic Claude and any `OpenAI`-compatible chat endpoint.

pub mod anthropic;
pub mod openai;

use crate::{NarrativeError, NarrativeGenerator, NoopNarrative};

/// Creates a generator from environment variables.
///
/// `NARRATIVE_PROVIDER` selects `anthropic`, `openai`, or `none`. When it
/// is unset the provider is detected from `ANTHROPIC_API_KEY`, then
/// `OPENAI_API_KEY`, falling back to no narrative. `AI_MODEL` and
/// `AI_BASE_URL` override the provider's default model and endpoint.
///
/// # Errors
///
/// Returns [`NarrativeError::Config`] if the requested provider has no key
/// or the provider name is unknown.
pub fn create_from_env() -> Result<Box<dyn NarrativeGenerator>, NarrativeError> {
    create_from_vars(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// [`create_from_env`] over an arbitrary variable lookup.
///
/// # Errors
///
/// See [`create_from_env`].
pub fn create_from_vars<F>(var: F) -> Result<Box<dyn NarrativeGenerator>, NarrativeError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = var("NARRATIVE_PROVIDER").unwrap_or_else(|| detect_provider(&var));
    let model = var("AI_MODEL");
    let base_url = var("AI_BASE_URL");

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = var("ANTHROPIC_API_KEY").ok_or_else(|| NarrativeError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            Ok(Box::new(anthropic::AnthropicNarrative::new(
                api_key,
                model.unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string()),
                base_url.unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
            )))
        }
        "openai" | "gpt" => {
            let api_key = var("OPENAI_API_KEY").ok_or_else(|| NarrativeError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
            Ok(Box::new(openai::OpenAiNarrative::new(
                api_key,
                model.unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
                base_url.unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
            )))
        }
        "none" | "off" => Ok(Box::new(NoopNarrative)),
        other => Err(NarrativeError::Config {
            message: format!(
                "Unknown narrative provider: {other}. Use 'anthropic', 'openai', or 'none'."
            ),
        }),
    }
}

fn detect_provider<F>(var: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if var("ANTHROPIC_API_KEY").is_some() {
        log::info!("Auto-detected narrative provider: Anthropic (ANTHROPIC_API_KEY found)");
        return "anthropic".to_string();
    }
    if var("OPENAI_API_KEY").is_some() {
        log::info!("Auto-detected narrative provider: OpenAI (OPENAI_API_KEY found)");
        return "openai".to_string();
    }
    log::debug!("No narrative credentials found, narratives disabled");
    "none".to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn create(vars: &[(&str, &str)]) -> Result<Box<dyn NarrativeGenerator>, NarrativeError> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        create_from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn no_credentials_means_no_narrative() {
        assert_eq!(create(&[]).unwrap().id(), "none");
    }

    #[test]
    fn detects_anthropic_before_openai() {
        let generator = create(&[("ANTHROPIC_API_KEY", "a"), ("OPENAI_API_KEY", "o")]).unwrap();
        assert_eq!(generator.id(), "anthropic");
    }

    #[test]
    fn explicit_provider_wins() {
        let generator = create(&[
            ("NARRATIVE_PROVIDER", "openai"),
            ("ANTHROPIC_API_KEY", "a"),
            ("OPENAI_API_KEY", "o"),
        ])
        .unwrap();
        assert_eq!(generator.id(), "openai");

        let generator = create(&[("NARRATIVE_PROVIDER", "none"), ("OPENAI_API_KEY", "o")]).unwrap();
        assert_eq!(generator.id(), "none");
    }

    #[test]
    fn explicit_provider_without_key_is_an_error() {
        assert!(matches!(
            create(&[("NARRATIVE_PROVIDER", "anthropic")]),
            Err(NarrativeError::Config { .. })
        ));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        assert!(matches!(
            create(&[("NARRATIVE_PROVIDER", "oracle")]),
            Err(NarrativeError::Config { .. })
        ));
    }
}
