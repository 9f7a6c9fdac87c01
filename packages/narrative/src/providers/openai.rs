//! `OpenAI`-compatible chat completions generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{NarrativeError, NarrativeGenerator, SYSTEM_PROMPT, user_prompt};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const MAX_TOKENS: u32 = 400;

/// Narratives from an `OpenAI`-compatible endpoint.
pub struct OpenAiNarrative {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiNarrative {
    #[must_use]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: [OpenAiMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// Text of the first choice of a chat completion.
///
/// # Errors
///
/// Returns [`NarrativeError::Json`] if the body is not a chat completion.
pub fn parse_response(body: &str) -> Result<Option<String>, NarrativeError> {
    let response: OpenAiResponse = serde_json::from_str(body)?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty()))
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrative {
    fn id(&self) -> &str {
        "openai"
    }

    async fn narrate(
        &self,
        title: &str,
        facts: &serde_json::Value,
    ) -> Result<Option<String>, NarrativeError> {
        let prompt = user_prompt(title, facts)?;
        let request = OpenAiRequest {
            model: &self.model,
            messages: [
                OpenAiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                OpenAiMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        let resp = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message);
            return Err(NarrativeError::Provider { message });
        }

        parse_response(&body)
    }
}
