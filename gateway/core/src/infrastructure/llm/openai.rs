// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Also works with OpenAI-compatible APIs (vLLM, LM Studio, gateways) by
// pointing `llm.openai.base_url` at them.

use async_trait::async_trait;
use std::time::Duration;

use super::compat::{ChatCompletions, Message};
use crate::domain::config::{non_blank, LlmConfig};
use crate::domain::llm::{ChatClient, LlmError};
use crate::infrastructure::http_client::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "openai";

pub struct OpenAiClient {
    inner: ChatCompletions,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        let openai = &config.openai;
        let api_key = non_blank(&openai.api_key)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.openai.api_key is not set"))?;
        let model = non_blank(&openai.model)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.openai.model is not set"))?;
        let base_url = non_blank(&openai.base_url).unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            inner: ChatCompletions {
                provider: PROVIDER,
                url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                api_key: api_key.to_string(),
                model: model.to_string(),
                temperature: None,
                timeout: Duration::from_secs(config.timeout_secs),
                default_user: config.default_user.clone(),
                transport,
            },
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, prompt: &str, user: Option<&str>) -> Result<String, LlmError> {
        self.inner.complete(vec![Message::user(prompt)], user).await
    }
}
