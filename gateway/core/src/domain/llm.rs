// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Language-Model Client Domain Interface (Anti-Corruption Layer)
//!
//! Route handlers only see these traits; provider wire formats stay inside
//! `infrastructure/llm/`.

use async_trait::async_trait;

/// Text chat against one provider
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Provider identifier (e.g., "dashscope", "volcengine")
    fn provider(&self) -> &str;

    /// Send one prompt and return the model's answer text
    async fn chat(&self, prompt: &str, user: Option<&str>) -> Result<String, LlmError>;
}

/// Image understanding against one provider
#[async_trait]
pub trait VisionClient: Send + Sync {
    fn provider(&self) -> &str;

    async fn analyze_image(
        &self,
        image_url: &str,
        prompt: &str,
        user: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError>;
}

/// Errors that can occur during language-model operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("LLM provider '{provider}' is misconfigured: {reason}")]
    MisconfiguredProvider { provider: String, reason: String },

    #[error("LLM provider '{provider}' returned an unexpected response: {reason}")]
    ProviderResponse { provider: String, reason: String },

    #[error("LLM provider '{provider}' returned an empty answer")]
    ProviderEmptyAnswer { provider: String },

    #[error("Request to LLM provider failed after {attempts} attempt(s): {reason}")]
    RequestFailed { attempts: u32, reason: String },
}

impl LlmError {
    pub fn misconfigured(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MisconfiguredProvider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
