// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tunnel Registry
//!
//! Process-wide map of `(remote_host, remote_port)` to a live forwarder.
//!
//! # Concurrency
//!
//! The outer map lock is a short synchronous critical section that only
//! hands out the per-key async mutex. Creation happens while holding that
//! per-key mutex, so concurrent first use of one key opens exactly one
//! tunnel while different keys are established in parallel.
//!
//! Inactive forwarders are not monitored; the next `acquire` notices and
//! replaces them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::tunnel::{
    TunnelBroker, TunnelConnector, TunnelError, TunnelForwarder, TunnelKey, TunnelPolicy,
};

type TunnelSlot = Arc<tokio::sync::Mutex<Option<Box<dyn TunnelForwarder>>>>;

pub struct TunnelRegistry {
    policy: TunnelPolicy,
    connector: Arc<dyn TunnelConnector>,
    tunnels: Mutex<HashMap<TunnelKey, TunnelSlot>>,
}

impl TunnelRegistry {
    pub fn new(policy: TunnelPolicy, connector: Arc<dyn TunnelConnector>) -> Self {
        Self {
            policy,
            connector,
            tunnels: Mutex::new(HashMap::new()),
        }
    }

    /// Number of forwarders currently tracked and reporting active.
    #[cfg(test)]
    async fn active_count(&self) -> usize {
        let slots: Vec<TunnelSlot> = self.tunnels.lock().values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.as_ref().is_some_and(|f| f.is_active()) {
                count += 1;
            }
        }
        count
    }

    fn slot_for(&self, key: &TunnelKey) -> TunnelSlot {
        self.tunnels.lock().entry(key.clone()).or_default().clone()
    }
}

#[async_trait]
impl TunnelBroker for TunnelRegistry {
    async fn acquire(&self, key: &TunnelKey) -> Result<SocketAddr, TunnelError> {
        let jump_host = self.policy.jump_host()?;

        let slot = self.slot_for(key);
        let mut current = slot.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.is_active() {
                debug!(key = %key, local = %existing.local_addr(), "Reusing SSH tunnel");
                return Ok(existing.local_addr());
            }

            warn!(key = %key, "SSH tunnel went inactive, recreating");
            if let Err(e) = existing.stop().await {
                debug!(key = %key, error = %e, "Stopping stale tunnel failed");
            }
            *current = None;
        }

        info!(
            key = %key,
            jump_host = %jump_host,
            "Creating SSH tunnel"
        );

        let timeout = self.policy.connect_timeout();
        let forwarder = match tokio::time::timeout(timeout, self.connector.open(jump_host, key)).await
        {
            Ok(Ok(forwarder)) => forwarder,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "SSH tunnel establishment failed");
                return Err(e);
            }
            Err(_) => {
                warn!(key = %key, timeout_ms = timeout.as_millis() as u64, "SSH tunnel establishment timed out");
                return Err(TunnelError::Establish {
                    key: key.clone(),
                    jump_host: jump_host.to_string(),
                    reason: format!("timed out after {:?}", timeout),
                });
            }
        };

        let local = forwarder.local_addr();
        info!(key = %key, local = %local, "SSH tunnel created");
        *current = Some(forwarder);
        Ok(local)
    }

    async fn release_all(&self) {
        let drained: Vec<(TunnelKey, TunnelSlot)> = self.tunnels.lock().drain().collect();
        if drained.is_empty() {
            return;
        }

        info!("Stopping {} SSH tunnel(s)", drained.len());
        for (key, slot) in drained {
            let Some(forwarder) = slot.lock().await.take() else {
                continue;
            };
            match forwarder.stop().await {
                Ok(()) => info!(key = %key, "SSH tunnel stopped"),
                Err(e) => warn!(key = %key, error = %e, "Error stopping SSH tunnel"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SshTunnelConfig;
    use crate::domain::tunnel::JumpHost;
    use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeForwarder {
        addr: SocketAddr,
        active: Arc<AtomicBool>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TunnelForwarder for FakeForwarder {
        fn local_addr(&self) -> SocketAddr {
            self.addr
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        async fn stop(&self) -> Result<(), TunnelError> {
            self.active.store(false, Ordering::SeqCst);
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        opens: AtomicUsize,
        stops: Arc<AtomicUsize>,
        next_port: AtomicU16,
        last_active: Mutex<Option<Arc<AtomicBool>>>,
        delay: Option<Duration>,
    }

    impl FakeConnector {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TunnelConnector for FakeConnector {
        async fn open(
            &self,
            _jump_host: &JumpHost,
            _key: &TunnelKey,
        ) -> Result<Box<dyn TunnelForwarder>, TunnelError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let port = 40000 + self.next_port.fetch_add(1, Ordering::SeqCst);
            let active = Arc::new(AtomicBool::new(true));
            *self.last_active.lock() = Some(active.clone());
            Ok(Box::new(FakeForwarder {
                addr: SocketAddr::from(([127, 0, 0, 1], port)),
                active,
                stops: self.stops.clone(),
            }))
        }
    }

    fn enabled_policy() -> TunnelPolicy {
        TunnelPolicy::from_config(&SshTunnelConfig {
            enabled: true,
            ssh_host: "jump.example.com".to_string(),
            ssh_username: "ops".to_string(),
            ssh_password: "secret".to_string(),
            ..SshTunnelConfig::default()
        })
    }

    #[tokio::test]
    async fn test_disabled_policy_never_opens() {
        let connector = Arc::new(FakeConnector::default());
        let registry = TunnelRegistry::new(TunnelPolicy::disabled(), connector.clone());

        let err = registry
            .acquire(&TunnelKey::new("10.1.1.5", 3306))
            .await
            .unwrap_err();
        assert_eq!(err, TunnelError::PolicyDisabled);
        assert_eq!(connector.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_opens_exactly_one_tunnel() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(50)));
        let registry = Arc::new(TunnelRegistry::new(enabled_policy(), connector.clone()));
        let key = TunnelKey::new("10.1.1.5", 3306);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { registry.acquire(&key).await }));
        }

        let mut ports = Vec::new();
        for handle in handles {
            ports.push(handle.await.unwrap().unwrap().port());
        }

        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
        assert!(ports.iter().all(|p| *p == ports[0]));
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_tunnels() {
        let connector = Arc::new(FakeConnector::default());
        let registry = TunnelRegistry::new(enabled_policy(), connector.clone());

        let a = registry.acquire(&TunnelKey::new("10.1.1.5", 3306)).await.unwrap();
        let b = registry.acquire(&TunnelKey::new("10.1.1.5", 9030)).await.unwrap();

        assert_ne!(a.port(), b.port());
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
        assert_eq!(registry.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_inactive_tunnel_is_recreated() {
        let connector = Arc::new(FakeConnector::default());
        let registry = TunnelRegistry::new(enabled_policy(), connector.clone());
        let key = TunnelKey::new("10.0.0.7", 6379);

        let first = registry.acquire(&key).await.unwrap();
        let again = registry.acquire(&key).await.unwrap();
        assert_eq!(first, again);

        let active = connector.last_active.lock().clone().unwrap();
        active.store(false, Ordering::SeqCst);

        let replaced = registry.acquire(&key).await.unwrap();
        assert_ne!(first, replaced);
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
        assert_eq!(connector.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_establishment_is_bounded_by_timeout() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_secs(5)));
        let policy = enabled_policy().with_connect_timeout(Duration::from_millis(20));
        let registry = TunnelRegistry::new(policy, connector);

        let err = registry
            .acquire(&TunnelKey::new("10.1.1.5", 3306))
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Establish { .. }));
    }

    #[tokio::test]
    async fn test_release_all_stops_everything_and_is_idempotent() {
        let connector = Arc::new(FakeConnector::default());
        let registry = TunnelRegistry::new(enabled_policy(), connector.clone());

        registry.acquire(&TunnelKey::new("a", 1)).await.unwrap();
        registry.acquire(&TunnelKey::new("b", 2)).await.unwrap();

        registry.release_all().await;
        assert_eq!(connector.stops.load(Ordering::SeqCst), 2);
        assert_eq!(registry.active_count().await, 0);

        registry.release_all().await;
        assert_eq!(connector.stops.load(Ordering::SeqCst), 2);
    }
}
