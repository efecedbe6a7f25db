// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Dify LLM Provider Adapter
//
// Blocking-mode application API. The prompt travels as the `prompt` input
// variable; the answer comes back in `answer` (chat apps) or `output_text`
// (completion apps).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::compat::from_transport;
use crate::domain::config::{non_blank, LlmConfig};
use crate::domain::llm::{ChatClient, LlmError};
use crate::infrastructure::http_client::{HttpTransport, RequestSpec};

const PROVIDER: &str = "dify";

pub struct DifyClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    default_user: Option<String>,
    transport: HttpTransport,
}

#[derive(Serialize)]
struct DifyRequest<'a> {
    inputs: DifyInputs<'a>,
    response_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Serialize)]
struct DifyInputs<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct DifyResponse {
    answer: Option<String>,
    output_text: Option<String>,
}

impl DifyClient {
    pub fn from_config(config: &LlmConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        let endpoint = non_blank(&config.dify.endpoint)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.dify.endpoint is not set"))?;
        let api_key = non_blank(&config.dify.api_key)
            .ok_or_else(|| LlmError::misconfigured(PROVIDER, "llm.dify.api_key is not set"))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            default_user: config.default_user.clone(),
            transport,
        })
    }
}

#[async_trait]
impl ChatClient for DifyClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, prompt: &str, user: Option<&str>) -> Result<String, LlmError> {
        let user = user.or(self.default_user.as_deref());
        info!(provider = PROVIDER, user = user.unwrap_or("-"), "LLM chat request");

        let request = DifyRequest {
            inputs: DifyInputs { prompt },
            response_mode: "blocking",
            user,
        };
        let req = RequestSpec::post(&self.endpoint)
            .bearer(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .map_err(|e| LlmError::response(PROVIDER, e.to_string()))?;

        let response = self
            .transport
            .request(req)
            .await
            .map_err(|e| from_transport(PROVIDER, e))?;
        let body: DifyResponse = response
            .json()
            .map_err(|e| LlmError::response(PROVIDER, e.to_string()))?;

        match body
            .answer
            .into_iter()
            .chain(body.output_text)
            .find(|text| !text.trim().is_empty())
        {
            Some(answer) => Ok(answer),
            None => {
                warn!(provider = PROVIDER, raw = %response.text(), "LLM returned no answer");
                Err(LlmError::ProviderEmptyAnswer {
                    provider: PROVIDER.to_string(),
                })
            }
        }
    }
}
