// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared outbound HTTP transport
//!
//! One long-lived `reqwest::Client` for the whole process. Every request is
//! retried on network errors and error statuses, with a linear backoff of
//! 200 ms per attempt already made, and every attempt is logged with its
//! outcome and latency.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::domain::address::redact;
use crate::domain::config::HttpConfig;

const BACKOFF_STEP: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid HTTP client configuration: {0}")]
    Client(String),

    #[error("{method} {url} failed after {attempts} attempt(s): {reason}")]
    RequestFailed {
        method: String,
        url: String,
        attempts: u32,
        /// Last HTTP status seen, when the server answered at all
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// One outbound request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    timeout: Option<Duration>,
    retries: Option<u32>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json: None,
            timeout: None,
            retries: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(body).map_err(|e| TransportError::Decode {
            url: redact(&self.url),
            reason: format!("request body: {}", e),
        })?;
        self.json = Some(value);
        Ok(self)
    }

    /// Overrides `http.timeout_secs` for this request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides `http.max_retries` for this request
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Buffered response of a successful request
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub url: String,
    pub body: bytes::Bytes,
}

impl TransportResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode {
            url: redact(&self.url),
            reason: e.to_string(),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| TransportError::Client(format!("proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        info!(
            timeout_secs = timeout.as_secs(),
            retries = config.max_retries,
            "HTTP transport initialized"
        );

        Ok(Self {
            client,
            timeout,
            max_retries: config.max_retries,
        })
    }

    pub async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.request(RequestSpec::get(url)).await
    }

    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<TransportResponse, TransportError> {
        self.request(RequestSpec::post(url).json(body)?).await
    }

    /// Send `req`, retrying up to its retry budget.
    pub async fn request(&self, req: RequestSpec) -> Result<TransportResponse, TransportError> {
        let timeout = req.timeout.unwrap_or(self.timeout);
        let retries = req.retries.unwrap_or(self.max_retries);
        let attempts = retries + 1;
        let shown_url = redact(&req.url);

        let mut last_status = None;
        let mut last_reason = String::new();

        for attempt in 0..attempts {
            let started = Instant::now();
            let mut builder = self
                .client
                .request(req.method.clone(), &req.url)
                .timeout(timeout);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &req.json {
                builder = builder.json(body);
            }

            let outcome = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.bytes().await {
                        Ok(body) => Ok((status, body)),
                        Err(e) => Err((Some(status), e.to_string())),
                    }
                }
                Err(e) => Err((None, e.to_string())),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok((status, body)) if status.is_success() => {
                    info!(
                        method = %req.method,
                        url = %shown_url,
                        status = status.as_u16(),
                        elapsed_ms,
                        "HTTP {} {} -> {}",
                        req.method,
                        shown_url,
                        status.as_u16()
                    );
                    return Ok(TransportResponse {
                        status: status.as_u16(),
                        url: req.url,
                        body,
                    });
                }
                Ok((status, body)) => {
                    last_status = Some(status.as_u16());
                    last_reason = status_reason(status, &body);
                }
                Err((status, reason)) => {
                    last_status = status.map(|s| s.as_u16());
                    last_reason = reason;
                }
            }

            warn!(
                method = %req.method,
                url = %shown_url,
                attempt = attempt + 1,
                attempts,
                elapsed_ms,
                error = %last_reason,
                "HTTP request failed"
            );

            if attempt + 1 < attempts {
                tokio::time::sleep(BACKOFF_STEP * (attempt + 1)).await;
            }
        }

        Err(TransportError::RequestFailed {
            method: req.method.to_string(),
            url: shown_url,
            attempts,
            status: last_status,
            reason: last_reason,
        })
    }
}

fn status_reason(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let snippet: String = text.chars().take(256).collect();
    if snippet.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, snippet)
    }
}
