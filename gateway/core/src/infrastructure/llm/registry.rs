// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Client Factory - Provider Resolution and Memoization
//
// Maps a provider id onto a concrete client, building each one at most once
// per process. Ids are case-insensitive and `volc` aliases `volcengine`.
// Construction failures are not memoized, so fixing configuration and
// restarting is never needed just to clear a cached error.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::dashscope::{DashScopeClient, DashScopeVisionClient};
use super::dify::DifyClient;
use super::openai::OpenAiClient;
use super::volcengine::VolcEngineClient;
use crate::domain::config::LlmConfig;
use crate::domain::llm::{ChatClient, LlmError, VisionClient};
use crate::infrastructure::http_client::HttpTransport;

pub struct LlmClientFactory {
    config: LlmConfig,
    transport: HttpTransport,
    clients: Mutex<HashMap<&'static str, Arc<dyn ChatClient>>>,
    vision: Mutex<Option<Arc<dyn VisionClient>>>,
}

impl LlmClientFactory {
    pub fn new(config: LlmConfig, transport: HttpTransport) -> Self {
        Self {
            config,
            transport,
            clients: Mutex::new(HashMap::new()),
            vision: Mutex::new(None),
        }
    }

    /// Provider used when callers do not name one
    pub fn default_provider(&self) -> &str {
        &self.config.provider
    }

    /// Canonical provider id for `requested`, if known
    pub fn canonical(requested: &str) -> Option<&'static str> {
        match requested.trim().to_lowercase().as_str() {
            "dify" => Some("dify"),
            "dashscope" => Some("dashscope"),
            "volcengine" | "volc" => Some("volcengine"),
            "openai" => Some("openai"),
            _ => None,
        }
    }

    /// Chat client for `provider`, or for the configured default when `None`.
    pub fn get(&self, provider: Option<&str>) -> Result<Arc<dyn ChatClient>, LlmError> {
        let requested = provider.unwrap_or(&self.config.provider);
        let id = Self::canonical(requested)
            .ok_or_else(|| LlmError::UnsupportedProvider(requested.to_string()))?;

        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(id) {
            return Ok(client.clone());
        }

        let client = self.build(id)?;
        info!(provider = id, "Init LLM client");
        clients.insert(id, client.clone());
        Ok(client)
    }

    /// The image-understanding client.
    pub fn get_vision(&self) -> Result<Arc<dyn VisionClient>, LlmError> {
        let mut vision = self.vision.lock();
        if let Some(client) = vision.as_ref() {
            return Ok(client.clone());
        }

        let client: Arc<dyn VisionClient> = Arc::new(DashScopeVisionClient::from_config(
            &self.config,
            self.transport.clone(),
        )?);
        info!(provider = client.provider(), "Init LLM vision client");
        *vision = Some(client.clone());
        Ok(client)
    }

    fn build(&self, id: &'static str) -> Result<Arc<dyn ChatClient>, LlmError> {
        let transport = self.transport.clone();
        let client: Arc<dyn ChatClient> = match id {
            "dify" => Arc::new(DifyClient::from_config(&self.config, transport)?),
            "dashscope" => Arc::new(DashScopeClient::from_config(&self.config, transport)?),
            "volcengine" => Arc::new(VolcEngineClient::from_config(&self.config, transport)?),
            "openai" => Arc::new(OpenAiClient::from_config(&self.config, transport)?),
            other => return Err(LlmError::UnsupportedProvider(other.to_string())),
        };
        Ok(client)
    }
}
