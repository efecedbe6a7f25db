// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Search index client
//!
//! Talks to the cluster's REST API over the shared HTTP transport. Every
//! configured node URL goes through the address rewriter independently; calls
//! try nodes in configuration order and return the first success.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::ResourceSlot;
use crate::domain::address::redact;
use crate::domain::config::SearchConfig;
use crate::domain::resource::{ManagedResource, ResourceError, ResourceKind, SlotState};
use crate::infrastructure::http_client::{HttpTransport, RequestSpec};
use crate::infrastructure::rewriter::AddressRewriter;

const SLOT: &str = "es.main";

#[derive(Clone)]
pub struct SearchClient {
    nodes: Vec<String>,
    transport: HttpTransport,
}

impl SearchClient {
    pub fn new(nodes: Vec<String>, transport: HttpTransport) -> Self {
        Self { nodes, transport }
    }

    /// Effective node URLs, credentials included
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// `GET /` cluster information.
    pub async fn info(&self) -> Result<Value, ResourceError> {
        self.get_json("/").await
    }

    pub async fn cluster_name(&self) -> Result<Option<String>, ResourceError> {
        let info = self.info().await?;
        Ok(info
            .get("cluster_name")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ResourceError> {
        let mut last_error = None;
        for node in &self.nodes {
            let url = join(node, path);
            match self.transport.request(RequestSpec::get(url)).await {
                Ok(response) => {
                    return response
                        .json()
                        .map_err(|e| ResourceError::operation(SLOT, e));
                }
                Err(e) => {
                    warn!(node = %redact(node), error = %e, "Search node request failed");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => ResourceError::operation(SLOT, e),
            None => ResourceError::not_configured(SLOT, "set es.hosts or ES__HOSTS"),
        })
    }
}

fn join(node: &str, path: &str) -> String {
    format!(
        "{}/{}",
        node.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub struct SearchStore {
    hosts: Vec<String>,
    transport: HttpTransport,
    rewriter: Arc<AddressRewriter>,
    slot: ResourceSlot<SearchClient>,
}

impl SearchStore {
    pub fn from_config(
        config: &SearchConfig,
        transport: HttpTransport,
        rewriter: Arc<AddressRewriter>,
    ) -> Self {
        Self {
            hosts: config
                .hosts
                .iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            transport,
            rewriter,
            slot: ResourceSlot::new(SLOT),
        }
    }

    pub async fn client(&self) -> Result<SearchClient, ResourceError> {
        self.slot.get_or_init(|| self.build()).await
    }

    async fn build(&self) -> Result<SearchClient, ResourceError> {
        if self.hosts.is_empty() {
            return Err(ResourceError::not_configured(SLOT, "set es.hosts or ES__HOSTS"));
        }
        let nodes = self.rewriter.rewrite_all(&self.hosts).await?;
        let shown: Vec<String> = nodes.iter().map(|n| redact(n)).collect();
        info!(slot = SLOT, hosts = ?shown, "Search client ready");
        Ok(SearchClient::new(nodes, self.transport.clone()))
    }
}

#[async_trait]
impl ManagedResource for SearchStore {
    fn name(&self) -> &str {
        SLOT
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Search
    }

    fn is_configured(&self) -> bool {
        !self.hosts.is_empty()
    }

    async fn state(&self) -> SlotState {
        self.slot.state()
    }

    async fn warm_up(&self) -> Result<(), ResourceError> {
        self.client().await.map(|_| ())
    }

    async fn close(&self) {
        self.slot.close(|_client| async {}).await;
    }
}
