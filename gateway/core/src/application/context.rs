// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Context
//!
//! The one object built at startup that owns every registry: tunnel broker,
//! resource slots, language-model factory and the shared HTTP transport.
//! Route handlers receive it as axum state and reach resources only through
//! its accessors.
//!
//! # Construction
//!
//! [`GatewayContext::build`] wires the russh connector; tests use
//! [`GatewayContext::with_broker`] to inject a fake [`TunnelBroker`].

use std::sync::Arc;

use crate::domain::config::GatewayConfig;
use crate::domain::llm::{ChatClient, LlmError, VisionClient};
use crate::domain::resource::{ManagedResource, ResourceError};
use crate::domain::tunnel::{TunnelBroker, TunnelPolicy};
use crate::infrastructure::http_client::{HttpTransport, TransportError};
use crate::infrastructure::llm::LlmClientFactory;
use crate::infrastructure::resources::{
    DorisRegistry, MongoRegistry, MongoStore, MysqlRegistry, ObjectStorageStore, RedisStore,
    SearchClient, SearchStore, UploadSigner,
};
use crate::infrastructure::rewriter::AddressRewriter;
use crate::infrastructure::tunnel::{SshTunnelConnector, TunnelRegistry};

use super::lifecycle::ResourceLifecycle;

pub struct GatewayContext {
    config: Arc<GatewayConfig>,
    http: HttpTransport,
    mysql: MysqlRegistry,
    doris: DorisRegistry,
    redis: Arc<RedisStore>,
    mongo: MongoRegistry,
    search: Arc<SearchStore>,
    object_storage: Arc<ObjectStorageStore>,
    llm: LlmClientFactory,
    lifecycle: ResourceLifecycle,
}

impl GatewayContext {
    /// Wire every registry from configuration. Nothing connects yet.
    pub fn build(config: GatewayConfig) -> Result<Self, TransportError> {
        let policy = TunnelPolicy::from_config(&config.ssh_tunnel);
        let broker: Arc<dyn TunnelBroker> =
            Arc::new(TunnelRegistry::new(policy, Arc::new(SshTunnelConnector::new())));
        Self::with_broker(config, broker)
    }

    pub fn with_broker(
        config: GatewayConfig,
        broker: Arc<dyn TunnelBroker>,
    ) -> Result<Self, TransportError> {
        let http = HttpTransport::new(&config.http)?;
        let rewriter = Arc::new(AddressRewriter::new(broker.clone()));
        let show_sql = config.logging.show_sql;

        let mysql = MysqlRegistry::from_config(&config.mysql, show_sql, rewriter.clone());
        let doris = DorisRegistry::from_config(&config.doris, show_sql, rewriter.clone());
        let redis = Arc::new(RedisStore::from_config(&config.redis, rewriter.clone()));
        let mongo = MongoRegistry::from_config(&config.mongo, rewriter.clone());
        let search = Arc::new(SearchStore::from_config(&config.es, http.clone(), rewriter));
        let object_storage = Arc::new(ObjectStorageStore::from_config(&config.object_storage));
        let llm = LlmClientFactory::new(config.llm.clone(), http.clone());

        let mut resources: Vec<Arc<dyn ManagedResource>> = Vec::new();
        resources.extend(mysql.managed());
        resources.extend(doris.managed());
        resources.push(redis.clone());
        resources.extend(mongo.managed());
        resources.push(search.clone());
        resources.push(object_storage.clone());

        Ok(Self {
            config: Arc::new(config),
            http,
            mysql,
            doris,
            redis,
            mongo,
            search,
            object_storage,
            llm,
            lifecycle: ResourceLifecycle::new(resources, broker),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn mysql(&self) -> &MysqlRegistry {
        &self.mysql
    }

    pub fn doris(&self) -> &DorisRegistry {
        &self.doris
    }

    pub fn redis(&self) -> &RedisStore {
        &self.redis
    }

    pub fn mongo_primary(&self) -> &MongoStore {
        self.mongo.primary()
    }

    pub fn mongo_secondary(&self) -> &MongoStore {
        self.mongo.secondary()
    }

    pub async fn search(&self) -> Result<SearchClient, ResourceError> {
        self.search.client().await
    }

    pub async fn object_storage(&self) -> Result<UploadSigner, ResourceError> {
        self.object_storage.signer().await
    }

    /// Chat client for `provider`, or the configured default.
    pub fn llm(&self, provider: Option<&str>) -> Result<Arc<dyn ChatClient>, LlmError> {
        self.llm.get(provider)
    }

    pub fn vision_llm(&self) -> Result<Arc<dyn VisionClient>, LlmError> {
        self.llm.get_vision()
    }

    pub fn http(&self) -> &HttpTransport {
        &self.http
    }

    pub fn lifecycle(&self) -> &ResourceLifecycle {
        &self.lifecycle
    }

    /// Build mandatory clients (unless `lazy`) and report unconfigured ones.
    pub async fn warm_up(&self, lazy: bool) -> Result<(), ResourceError> {
        self.lifecycle.warm_up(lazy).await
    }

    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await
    }
}
