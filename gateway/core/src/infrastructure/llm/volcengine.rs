// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// VolcEngine Ark Provider Adapter
//
// OpenAI-compatible `{base_url}/chat/completions` with an explicit sampling
// temperature and its own (longer) timeout.

use async_trait::async_trait;
use std::time::Duration;

use super::compat::{ChatCompletions, Message, DEFAULT_SYSTEM_PROMPT};
use crate::domain::config::{non_blank, LlmConfig};
use crate::domain::llm::{ChatClient, LlmError};
use crate::infrastructure::http_client::HttpTransport;

const PROVIDER: &str = "volcengine";

pub struct VolcEngineClient {
    inner: ChatCompletions,
}

impl VolcEngineClient {
    pub fn from_config(config: &LlmConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        let volc = &config.volcengine;
        let base_url = non_blank(&volc.base_url)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.volcengine.base_url is not set"))?;
        let api_key = non_blank(&volc.api_key)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.volcengine.api_key is not set"))?;
        let model = non_blank(&volc.model)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.volcengine.model is not set"))?;

        Ok(Self {
            inner: ChatCompletions {
                provider: PROVIDER,
                url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                api_key: api_key.to_string(),
                model: model.to_string(),
                temperature: Some(volc.temperature),
                timeout: Duration::from_secs(volc.timeout_secs),
                default_user: config.default_user.clone(),
                transport,
            },
        })
    }
}

#[async_trait]
impl ChatClient for VolcEngineClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, prompt: &str, user: Option<&str>) -> Result<String, LlmError> {
        let messages = vec![Message::system(DEFAULT_SYSTEM_PROMPT), Message::user(prompt)];
        self.inner.complete(messages, user).await
    }
}
