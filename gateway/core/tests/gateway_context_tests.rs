// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use relaygate_core::domain::resource::{ManagedResource, ResourceError, SlotState};
use relaygate_core::domain::tunnel::{TunnelBroker, TunnelError, TunnelKey};
use relaygate_core::presentation::router;
use relaygate_core::{GatewayConfig, GatewayContext};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

/// Records every acquire and refuses to build tunnels.
#[derive(Default)]
struct RecordingBroker {
    acquired: Mutex<Vec<TunnelKey>>,
    releases: Mutex<u32>,
}

#[async_trait]
impl TunnelBroker for RecordingBroker {
    async fn acquire(&self, key: &TunnelKey) -> Result<SocketAddr, TunnelError> {
        self.acquired.lock().push(key.clone());
        Err(TunnelError::Establish {
            key: key.clone(),
            jump_host: "bastion.test:22".to_string(),
            reason: "refused by test broker".to_string(),
        })
    }

    async fn release_all(&self) {
        *self.releases.lock() += 1;
    }
}

fn context(config: GatewayConfig) -> (Arc<GatewayContext>, Arc<RecordingBroker>) {
    let broker = Arc::new(RecordingBroker::default());
    let ctx = GatewayContext::with_broker(config, broker.clone()).unwrap();
    (Arc::new(ctx), broker)
}

async fn get_json(ctx: Arc<GatewayContext>, uri: &str) -> (StatusCode, Value) {
    let response = router(ctx)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_warm_up_requires_main_relational_store() {
    let (ctx, broker) = context(GatewayConfig::default());

    for lazy in [false, true] {
        match ctx.warm_up(lazy).await {
            Err(ResourceError::NotConfigured { slot, .. }) => assert_eq!(slot, "mysql.main"),
            other => panic!("unexpected warm-up result: {:?}", other),
        }
    }
    assert!(broker.acquired.lock().is_empty());
}

#[tokio::test]
async fn test_lazy_warm_up_opens_nothing() {
    let mut config = GatewayConfig::default();
    config.mysql.main_url = "mysql://app:pw@10.1.1.5:3306/core".to_string();
    let (ctx, broker) = context(config);

    ctx.warm_up(true).await.unwrap();
    assert!(broker.acquired.lock().is_empty());
    assert_eq!(ctx.mysql().main().state().await, SlotState::Uninitialized);
}

#[tokio::test]
async fn test_eager_warm_up_surfaces_tunnel_failure() {
    let mut config = GatewayConfig::default();
    config.mysql.main_url = "mysql://app:pw@10.1.1.5:3306/core".to_string();
    let (ctx, broker) = context(config);

    let err = ctx.warm_up(false).await.unwrap_err();
    assert!(matches!(
        err,
        ResourceError::Tunnel(TunnelError::Establish { .. })
    ));
    assert_eq!(
        broker.acquired.lock().as_slice(),
        &[TunnelKey::new("10.1.1.5", 3306)]
    );
    // A failed first use leaves the slot retryable
    assert_eq!(ctx.mysql().main().state().await, SlotState::Uninitialized);
}

#[tokio::test]
async fn test_tunnel_failure_on_request_is_internal_error() {
    let mut config = GatewayConfig::default();
    config.redis.url = "redis://:secret@10.2.0.7:6379/0".to_string();
    let (ctx, broker) = context(config);

    let (status, body) = get_json(ctx, "/api/infra/ping/redis").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 50000);
    assert!(!body.to_string().contains("secret"));
    assert_eq!(
        broker.acquired.lock().as_slice(),
        &[TunnelKey::new("10.2.0.7", 6379)]
    );
}

#[tokio::test]
async fn test_misconfigured_tunnel_policy_fails_closed() {
    let mut config = GatewayConfig::default();
    config.redis.url = "redis://10.2.0.7:6379/0".to_string();
    config.ssh_tunnel.enabled = true;
    let ctx = Arc::new(GatewayContext::build(config).unwrap());

    let (status, body) = get_json(ctx.clone(), "/api/infra/ping/redis").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 10000);
    assert!(body["msg"].as_str().unwrap().contains("misconfigured"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_local_search_node_is_reached_directly() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(r#"{"cluster_name":"logs","version":{"number":"8.11.0"}}"#)
        .create_async()
        .await;

    let mut config = GatewayConfig::default();
    config.es.hosts = vec![server.url()];
    let (ctx, broker) = context(config);

    let (status, body) = get_json(ctx, "/api/infra/ping/es").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["cluster_name"], "logs");
    assert!(broker.acquired.lock().is_empty());
}

#[tokio::test]
async fn test_object_storage_ping_signs_with_configured_credentials() {
    let mut config = GatewayConfig::default();
    config.object_storage.access_key = "ak".to_string();
    config.object_storage.secret_key = "sk".to_string();
    config.object_storage.bucket = "media".to_string();
    config.object_storage.domain = "https://cdn.example.com".to_string();
    let (ctx, _broker) = context(config);

    let (status, body) = get_json(ctx, "/api/infra/ping/qiniu").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["bucket"], "media");
    assert_eq!(
        body["data"]["sample_url"],
        "https://cdn.example.com/relaygate/ping"
    );
}

#[tokio::test]
async fn test_shutdown_closes_everything_once() {
    let mut config = GatewayConfig::default();
    config.mysql.main_url = "mysql://app:pw@10.1.1.5:3306/core".to_string();
    let (ctx, broker) = context(config);

    ctx.shutdown().await;
    ctx.shutdown().await;

    assert!(ctx.lifecycle().is_shut_down());
    assert_eq!(*broker.releases.lock(), 1);
    for resource in ctx.lifecycle().resources() {
        assert_eq!(resource.state().await, SlotState::Closed, "{}", resource.name());
    }
    assert!(matches!(
        ctx.mysql().main().pool().await,
        Err(ResourceError::Closed(_))
    ));
}
