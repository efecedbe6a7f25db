// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cache store client
//
// `ConnectionManager` multiplexes commands over one connection and
// reconnects on its own; clones are cheap and share that connection.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;

use super::{require_setting, ResourceSlot};
use crate::domain::address::redact;
use crate::domain::config::RedisConfig;
use crate::domain::resource::{ManagedResource, ResourceError, ResourceKind, SlotState};
use crate::infrastructure::rewriter::AddressRewriter;

const SLOT: &str = "redis.main";

pub struct RedisStore {
    url: String,
    rewriter: Arc<AddressRewriter>,
    slot: ResourceSlot<ConnectionManager>,
}

impl RedisStore {
    pub fn from_config(config: &RedisConfig, rewriter: Arc<AddressRewriter>) -> Self {
        Self {
            url: config.url.clone(),
            rewriter,
            slot: ResourceSlot::new(SLOT),
        }
    }

    /// Shared multiplexed connection.
    pub async fn connection(&self) -> Result<ConnectionManager, ResourceError> {
        self.slot.get_or_init(|| self.connect()).await
    }

    pub async fn ping(&self) -> Result<String, ResourceError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| ResourceError::operation(SLOT, e))
    }

    async fn connect(&self) -> Result<ConnectionManager, ResourceError> {
        let raw = require_setting(&self.url, SLOT, "set redis.url or REDIS__URL")?;
        let effective = self.rewriter.rewrite(raw).await?;
        let address = redact(&effective);

        let connect_error = |reason: String| ResourceError::Connect {
            slot: SLOT.to_string(),
            address: address.clone(),
            reason,
        };

        info!(slot = SLOT, url = %address, "Connecting Redis");
        let client = redis::Client::open(effective.as_str()).map_err(|e| connect_error(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        info!(slot = SLOT, "Redis connection ready");
        Ok(manager)
    }
}

#[async_trait]
impl ManagedResource for RedisStore {
    fn name(&self) -> &str {
        SLOT
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Cache
    }

    fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    async fn state(&self) -> SlotState {
        self.slot.state()
    }

    async fn warm_up(&self) -> Result<(), ResourceError> {
        self.connection().await.map(|_| ())
    }

    async fn close(&self) {
        // Dropping the last manager clone closes the socket
        self.slot
            .close(|manager| async move {
                info!(slot = SLOT, "Closing Redis connection");
                drop(manager);
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tunnel::TunnelPolicy;
    use crate::infrastructure::tunnel::{SshTunnelConnector, TunnelRegistry};

    #[tokio::test]
    async fn test_blank_url_is_not_configured_and_close_is_safe() {
        let broker = TunnelRegistry::new(TunnelPolicy::disabled(), Arc::new(SshTunnelConnector::new()));
        let store = RedisStore::from_config(
            &RedisConfig::default(),
            Arc::new(AddressRewriter::new(Arc::new(broker))),
        );

        assert!(matches!(
            store.connection().await,
            Err(ResourceError::NotConfigured { .. })
        ));
        store.close().await;
        store.close().await;
        assert_eq!(store.state().await, SlotState::Closed);
    }
}
