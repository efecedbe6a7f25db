// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-compatible chat/completions wire format
//
// Shared by every provider that speaks this dialect (DashScope compatible
// mode, VolcEngine Ark, OpenAI itself). Providers only differ in URL,
// credentials, model and sampling knobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::llm::LlmError;
use crate::infrastructure::http_client::{HttpTransport, RequestSpec, TransportError};

pub(crate) const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Serialize)]
pub(crate) struct Message {
    role: &'static str,
    content: MessageContent,
}

impl Message {
    pub(crate) fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub(crate) fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub(crate) fn with_parts(role: &'static str, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
}

/// One chat/completions endpoint with fixed credentials and model.
#[derive(Clone)]
pub(crate) struct ChatCompletions {
    pub provider: &'static str,
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub timeout: Duration,
    pub default_user: Option<String>,
    pub transport: HttpTransport,
}

impl ChatCompletions {
    pub(crate) async fn complete(
        &self,
        messages: Vec<Message>,
        user: Option<&str>,
    ) -> Result<String, LlmError> {
        let user = user.or(self.default_user.as_deref());
        info!(
            provider = self.provider,
            model = %self.model,
            user = user.unwrap_or("-"),
            "LLM chat request"
        );

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            user,
        };
        let req = RequestSpec::post(&self.url)
            .bearer(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .map_err(|e| LlmError::response(self.provider, e.to_string()))?;

        let response = self
            .transport
            .request(req)
            .await
            .map_err(|e| from_transport(self.provider, e))?;

        let body: CompletionResponse = response
            .json()
            .map_err(|e| LlmError::response(self.provider, e.to_string()))?;

        let message = body
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .ok_or_else(|| {
                warn!(provider = self.provider, raw = %response.text(), "Unexpected LLM response");
                LlmError::response(self.provider, "response has no choices[0].message")
            })?;

        let answer = content_text(&message.content);
        if answer.trim().is_empty() {
            warn!(provider = self.provider, "LLM returned empty content");
            return Err(LlmError::ProviderEmptyAnswer {
                provider: self.provider.to_string(),
            });
        }
        Ok(answer)
    }
}

/// Message content as plain text; multi-part content is joined.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

/// Map a transport failure onto the provider error taxonomy.
pub(crate) fn from_transport(provider: &str, error: TransportError) -> LlmError {
    match error {
        TransportError::RequestFailed {
            status: Some(status),
            reason,
            ..
        } => LlmError::response(provider, format!("status {}: {}", status, reason)),
        TransportError::RequestFailed {
            attempts, reason, ..
        } => LlmError::RequestFailed { attempts, reason },
        other => LlmError::response(provider, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multimodal_message_serialization() {
        let message = Message::with_parts(
            "user",
            vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://img.example.com/a.jpg".to_string(),
                    },
                },
                ContentPart::Text {
                    text: "describe".to_string(),
                },
            ],
        );
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": "https://img.example.com/a.jpg"}},
                    {"type": "text", "text": "describe"}
                ]
            })
        );
    }

    #[test]
    fn test_content_text_variants() {
        assert_eq!(content_text(&json!("hello")), "hello");
        assert_eq!(
            content_text(&json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])),
            "ab"
        );
        assert_eq!(content_text(&Value::Null), "");
    }

    #[test]
    fn test_status_failures_become_provider_errors() {
        let err = from_transport(
            "openai",
            TransportError::RequestFailed {
                method: "POST".into(),
                url: "https://api.example.com".into(),
                attempts: 1,
                status: Some(401),
                reason: "unauthorized".into(),
            },
        );
        assert!(matches!(err, LlmError::ProviderResponse { .. }));

        let err = from_transport(
            "openai",
            TransportError::RequestFailed {
                method: "POST".into(),
                url: "https://api.example.com".into(),
                attempts: 4,
                status: None,
                reason: "connection refused".into(),
            },
        );
        assert!(matches!(err, LlmError::RequestFailed { attempts: 4, .. }));
    }
}
