// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// DashScope (Alibaba Cloud Model Studio) Provider Adapter
//
// Uses the OpenAI-compatible endpoint for both the text model and the
// vision model. Key resolution:
// - text:   api_key, then backup_api_key
// - vision: vision_api_key, then api_key, then backup_api_key

use async_trait::async_trait;
use std::time::Duration;

use super::compat::{ChatCompletions, ContentPart, ImageUrl, Message, DEFAULT_SYSTEM_PROMPT};
use crate::domain::config::{non_blank, LlmConfig};
use crate::domain::llm::{ChatClient, LlmError, VisionClient};
use crate::infrastructure::http_client::HttpTransport;

pub const DEFAULT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

const PROVIDER: &str = "dashscope";
const VISION_PROVIDER: &str = "dashscope-vision";

fn endpoint(config: &LlmConfig) -> String {
    non_blank(&config.dashscope.endpoint)
        .map(|e| e.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

pub struct DashScopeClient {
    inner: ChatCompletions,
}

impl DashScopeClient {
    pub fn from_config(config: &LlmConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        let dashscope = &config.dashscope;
        let api_key = non_blank(&dashscope.api_key)
            .or_else(|| non_blank(&dashscope.backup_api_key))
            .ok_or_else(|| {
                LlmError::misconfigured(
                    PROVIDER,
                    "neither llm.dashscope.api_key nor backup_api_key is set",
                )
            })?;

        Ok(Self {
            inner: ChatCompletions {
                provider: PROVIDER,
                url: endpoint(config),
                api_key: api_key.to_string(),
                model: dashscope.model.clone(),
                temperature: None,
                timeout: Duration::from_secs(config.timeout_secs),
                default_user: config.default_user.clone(),
                transport,
            },
        })
    }
}

#[async_trait]
impl ChatClient for DashScopeClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, prompt: &str, user: Option<&str>) -> Result<String, LlmError> {
        let messages = vec![Message::system(DEFAULT_SYSTEM_PROMPT), Message::user(prompt)];
        self.inner.complete(messages, user).await
    }
}

pub struct DashScopeVisionClient {
    inner: ChatCompletions,
}

impl DashScopeVisionClient {
    pub fn from_config(config: &LlmConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        let dashscope = &config.dashscope;
        let api_key = non_blank(&dashscope.vision_api_key)
            .or_else(|| non_blank(&dashscope.api_key))
            .or_else(|| non_blank(&dashscope.backup_api_key))
            .ok_or_else(|| {
                LlmError::misconfigured(
                    VISION_PROVIDER,
                    "no llm.dashscope vision_api_key, api_key or backup_api_key is set",
                )
            })?;

        Ok(Self {
            inner: ChatCompletions {
                provider: VISION_PROVIDER,
                url: endpoint(config),
                api_key: api_key.to_string(),
                model: dashscope.vision_model.clone(),
                temperature: None,
                timeout: Duration::from_secs(config.timeout_secs),
                default_user: config.default_user.clone(),
                transport,
            },
        })
    }
}

#[async_trait]
impl VisionClient for DashScopeVisionClient {
    fn provider(&self) -> &str {
        VISION_PROVIDER
    }

    async fn analyze_image(
        &self,
        image_url: &str,
        prompt: &str,
        user: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::with_parts(
                "system",
                vec![ContentPart::Text {
                    text: system.to_string(),
                }],
            ));
        }
        messages.push(Message::with_parts(
            "user",
            vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ],
        ));

        self.inner.complete(messages, user).await
    }
}
