// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MySQL-protocol connection pools
//!
//! Wraps `sqlx::mysql::MySqlPool` behind a lazily built slot. Used for the
//! relational store (`mysql.main`, `mysql.back`, `mysql.back2`) and, with a
//! different default port and pool size, for the analytical store.
//!
//! Callers take a [`Session`] per request: a pooled connection returned to
//! the pool when dropped, on every exit path.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

use super::{require_setting, ResourceSlot};
use crate::domain::address::{redact, with_default_port};
use crate::domain::config::{non_blank, MysqlConfig};
use crate::domain::resource::{
    ManagedResource, Requirement, ResourceError, ResourceKind, SlotState,
};
use crate::infrastructure::rewriter::AddressRewriter;

/// A pooled connection scoped to one unit of work.
pub type Session = PoolConnection<MySql>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Driver-level knobs for one pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Applied when the address omits its port
    pub default_port: u16,
    /// Applied when the address has no `charset` query parameter
    pub default_charset: Option<&'static str>,
    pub show_sql: bool,
}

pub struct MysqlStore {
    name: String,
    kind: ResourceKind,
    requirement: Requirement,
    url: String,
    hint: String,
    settings: PoolSettings,
    rewriter: Arc<AddressRewriter>,
    slot: ResourceSlot<MySqlPool>,
}

impl MysqlStore {
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        requirement: Requirement,
        url: impl Into<String>,
        hint: impl Into<String>,
        settings: PoolSettings,
        rewriter: Arc<AddressRewriter>,
    ) -> Self {
        let name = name.into();
        Self {
            slot: ResourceSlot::new(name.clone()),
            name,
            kind,
            requirement,
            url: url.into(),
            hint: hint.into(),
            settings,
            rewriter,
        }
    }

    /// Shared pool, connecting on first use.
    pub async fn pool(&self) -> Result<MySqlPool, ResourceError> {
        self.slot.get_or_init(|| self.connect()).await
    }

    /// One pooled connection for the caller's exclusive use.
    pub async fn session(&self) -> Result<Session, ResourceError> {
        let pool = self.pool().await?;
        pool.acquire()
            .await
            .map_err(|e| ResourceError::operation(&self.name, e))
    }

    /// `SELECT 1` round trip.
    pub async fn ping(&self) -> Result<bool, ResourceError> {
        let mut session = self.session().await?;
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut *session)
            .await
            .map_err(|e| ResourceError::operation(&self.name, e))?;
        Ok(one == 1)
    }

    async fn connect(&self) -> Result<MySqlPool, ResourceError> {
        let raw = require_setting(&self.url, &self.name, &self.hint)?;
        // the tunnel key needs a port even when the address leaves it implicit
        let raw = with_default_port(raw, self.settings.default_port);
        let effective = self.rewriter.rewrite(&raw).await?;
        let address = redact(&effective);

        let options = connect_options(&effective, &self.settings).map_err(|reason| {
            ResourceError::Connect {
                slot: self.name.clone(),
                address: address.clone(),
                reason,
            }
        })?;

        info!(slot = %self.name, url = %address, "Connecting MySQL pool");
        let pool = MySqlPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(|e| ResourceError::Connect {
                slot: self.name.clone(),
                address,
                reason: e.to_string(),
            })?;

        info!(slot = %self.name, max_connections = self.settings.max_connections, "MySQL pool ready");
        Ok(pool)
    }
}

#[async_trait]
impl ManagedResource for MysqlStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn requirement(&self) -> Requirement {
        self.requirement
    }

    fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    async fn state(&self) -> SlotState {
        self.slot.state()
    }

    async fn warm_up(&self) -> Result<(), ResourceError> {
        self.pool().await.map(|_| ())
    }

    async fn close(&self) {
        let name = self.name.clone();
        self.slot
            .close(|pool| async move {
                info!(slot = %name, "Closing MySQL pool");
                pool.close().await;
            })
            .await;
    }
}

/// Driver options for an effective address.
///
/// Accepts driver-qualified schemes (`mysql+aiomysql://`, `doris://`) by
/// normalizing them to `mysql://`.
pub fn connect_options(
    effective: &str,
    settings: &PoolSettings,
) -> Result<MySqlConnectOptions, String> {
    let mut url = Url::parse(effective).map_err(|e| format!("invalid address: {}", e))?;
    if url.scheme() != "mysql" && url.set_scheme("mysql").is_err() {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.port().is_none() && url.set_port(Some(settings.default_port)).is_err() {
        return Err("address cannot carry a port".to_string());
    }

    let has_charset = url.query_pairs().any(|(k, _)| k == "charset");
    let mut options = MySqlConnectOptions::from_str(url.as_str()).map_err(|e| e.to_string())?;
    if !has_charset {
        if let Some(charset) = settings.default_charset {
            options = options.charset(charset);
        }
    }
    if !settings.show_sql {
        options = options.disable_statement_logging();
    }
    Ok(options)
}

/// The relational store's named pools
pub struct MysqlRegistry {
    main: Arc<MysqlStore>,
    back: Arc<MysqlStore>,
    back2: Arc<MysqlStore>,
}

impl MysqlRegistry {
    pub fn from_config(config: &MysqlConfig, show_sql: bool, rewriter: Arc<AddressRewriter>) -> Self {
        let settings = PoolSettings {
            max_connections: config.max_connections.max(1),
            default_port: 3306,
            default_charset: None,
            show_sql,
        };
        let store = |name: &str, url: &str, requirement, hint: &str| {
            Arc::new(MysqlStore::new(
                name,
                ResourceKind::Relational,
                requirement,
                url,
                hint,
                settings.clone(),
                rewriter.clone(),
            ))
        };

        let optional = |value: &Option<String>| non_blank(value).unwrap_or_default().to_string();

        Self {
            main: store(
                "mysql.main",
                &config.main_url,
                Requirement::Mandatory,
                "set mysql.main_url or MYSQL__MAIN_URL",
            ),
            back: store(
                "mysql.back",
                &optional(&config.back_url),
                Requirement::Optional,
                "set mysql.back_url or MYSQL__BACK_URL",
            ),
            back2: store(
                "mysql.back2",
                &optional(&config.back2_url),
                Requirement::Optional,
                "set mysql.back2_url or MYSQL__BACK2_URL",
            ),
        }
    }

    pub fn main(&self) -> &Arc<MysqlStore> {
        &self.main
    }

    pub fn back(&self) -> &Arc<MysqlStore> {
        &self.back
    }

    pub fn back2(&self) -> &Arc<MysqlStore> {
        &self.back2
    }

    /// Session on the main pool.
    pub async fn session(&self) -> Result<Session, ResourceError> {
        self.main.session().await
    }

    pub fn managed(&self) -> Vec<Arc<dyn ManagedResource>> {
        let stores = [&self.main, &self.back, &self.back2];
        stores
            .into_iter()
            .map(|s| s.clone() as Arc<dyn ManagedResource>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tunnel::{TunnelBroker, TunnelError, TunnelKey};
    use parking_lot::Mutex;
    use std::net::SocketAddr;

    struct NoTunnels;

    #[async_trait]
    impl TunnelBroker for NoTunnels {
        async fn acquire(&self, _key: &TunnelKey) -> Result<SocketAddr, TunnelError> {
            Err(TunnelError::PolicyDisabled)
        }

        async fn release_all(&self) {}
    }

    /// Records requested keys and refuses every tunnel.
    #[derive(Default)]
    struct RefusingBroker {
        requested: Mutex<Vec<TunnelKey>>,
    }

    #[async_trait]
    impl TunnelBroker for RefusingBroker {
        async fn acquire(&self, key: &TunnelKey) -> Result<SocketAddr, TunnelError> {
            self.requested.lock().push(key.clone());
            Err(TunnelError::Establish {
                key: key.clone(),
                jump_host: "ops@jump:22".to_string(),
                reason: "refused".to_string(),
            })
        }

        async fn release_all(&self) {}
    }

    fn rewriter() -> Arc<AddressRewriter> {
        Arc::new(AddressRewriter::new(Arc::new(NoTunnels)))
    }

    fn settings(default_port: u16, default_charset: Option<&'static str>) -> PoolSettings {
        PoolSettings {
            max_connections: 5,
            default_port,
            default_charset,
            show_sql: false,
        }
    }

    #[test]
    fn test_connect_options_normalizes_driver_scheme() {
        let options = connect_options(
            "mysql+aiomysql://app:pw@10.1.1.5:3307/core",
            &settings(3306, None),
        )
        .unwrap();
        assert_eq!(options.get_host(), "10.1.1.5");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("core"));
    }

    #[test]
    fn test_connect_options_applies_defaults() {
        let options =
            connect_options("mysql://etl:pw@doris.internal/dw", &settings(9030, Some("utf8mb4")))
                .unwrap();
        assert_eq!(options.get_port(), 9030);
        assert_eq!(options.get_charset(), "utf8mb4");

        let options = connect_options(
            "mysql://etl:pw@doris.internal:9030/dw?charset=utf8",
            &settings(9030, Some("utf8mb4")),
        )
        .unwrap();
        assert_eq!(options.get_charset(), "utf8");
    }

    #[test]
    fn test_connect_options_rejects_garbage() {
        assert!(connect_options("not a url", &settings(3306, None)).is_err());
    }

    #[tokio::test]
    async fn test_blank_main_url_is_not_configured() {
        let registry = MysqlRegistry::from_config(&MysqlConfig::default(), false, rewriter());

        assert_eq!(registry.main().requirement(), Requirement::Mandatory);
        assert!(!registry.main().is_configured());
        assert!(matches!(
            registry.session().await,
            Err(ResourceError::NotConfigured { .. })
        ));
        assert_eq!(registry.main().state().await, SlotState::Uninitialized);
    }

    #[tokio::test]
    async fn test_close_without_use_is_safe() {
        let config = MysqlConfig {
            main_url: "mysql://u:p@10.1.1.5:3306/db".to_string(),
            back_url: Some("  ".to_string()),
            ..MysqlConfig::default()
        };
        let registry = MysqlRegistry::from_config(&config, false, rewriter());
        assert!(!registry.back().is_configured());

        for store in registry.managed() {
            store.close().await;
            store.close().await;
            assert_eq!(store.state().await, SlotState::Closed);
        }
        assert!(matches!(
            registry.main().pool().await,
            Err(ResourceError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_portless_address_is_tunnelled_on_default_port() {
        let broker = Arc::new(RefusingBroker::default());
        let config = MysqlConfig {
            main_url: "mysql://app:pw@db.internal/core".to_string(),
            ..MysqlConfig::default()
        };
        let registry = MysqlRegistry::from_config(
            &config,
            false,
            Arc::new(AddressRewriter::new(broker.clone())),
        );

        assert!(matches!(
            registry.main().pool().await,
            Err(ResourceError::Tunnel(TunnelError::Establish { .. }))
        ));
        assert_eq!(
            broker.requested.lock().as_slice(),
            &[TunnelKey::new("db.internal", 3306)]
        );
    }
}
