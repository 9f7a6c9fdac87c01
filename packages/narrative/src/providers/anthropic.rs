//! Anthropic Messages API generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{NarrativeError, NarrativeGenerator, SYSTEM_PROMPT, user_prompt};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const MAX_TOKENS: u32 = 400;

/// Narratives from Anthropic Claude.
pub struct AnthropicNarrative {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicNarrative {
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
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [AnthropicMessage<'a>; 1],
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

/// Joins the text blocks of a Messages API response.
///
/// # Errors
///
/// Returns [`NarrativeError::Json`] if the body is not a Messages response.
pub fn parse_response(body: &str) -> Result<Option<String>, NarrativeError> {
    let response: AnthropicResponse = serde_json::from_str(body)?;
    let text = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text),
            AnthropicContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok((!text.trim().is_empty()).then_some(text))
}

/// Extracts the provider's error message from a failed response.
#[must_use]
pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<AnthropicError>(body)
        .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message)
}

#[async_trait]
impl NarrativeGenerator for AnthropicNarrative {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn narrate(
        &self,
        title: &str,
        facts: &serde_json::Value,
    ) -> Result<Option<String>, NarrativeError> {
        let prompt = user_prompt(title, facts)?;
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: [AnthropicMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(NarrativeError::Provider {
                message: error_message(status, &body),
            });
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [
                { "type": "text", "text": "Expect heavy traffic near Thống Nhất Stadium." },
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "Deploy officers by 17:00." }
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(
            parse_response(&body.to_string()).unwrap().as_deref(),
            Some("Expect heavy traffic near Thống Nhất Stadium.\nDeploy officers by 17:00.")
        );
    }

    #[test]
    fn empty_content_is_none() {
        let body = json!({ "content": [], "stop_reason": "end_turn" });
        assert_eq!(parse_response(&body.to_string()).unwrap(), None);
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = json!({
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" }
        });
        assert_eq!(
            error_message(reqwest::StatusCode::from_u16(529).unwrap(), &body.to_string()),
            "Overloaded"
        );
        assert_eq!(
            error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream"),
            "HTTP 502 Bad Gateway: upstream"
        );
    }
}
