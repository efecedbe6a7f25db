// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Analytical store (Doris, spoken to over the MySQL protocol)
//
// Same pool type as the relational store with analytical defaults:
// query port 9030, `utf8mb4` unless the address names a charset, and a
// larger pool (10 steady + 20 overflow in the old sizing).

use std::sync::Arc;

use super::mysql::{MysqlStore, PoolSettings, Session};
use crate::domain::config::{non_blank, DorisConfig};
use crate::domain::resource::{ManagedResource, Requirement, ResourceError, ResourceKind};
use crate::infrastructure::rewriter::AddressRewriter;

pub const DORIS_DEFAULT_PORT: u16 = 9030;
pub const DORIS_POOL_SIZE: u32 = 30;
pub const DORIS_DEFAULT_CHARSET: &str = "utf8mb4";

pub struct DorisRegistry {
    query: Arc<MysqlStore>,
    streaming: Arc<MysqlStore>,
}

impl DorisRegistry {
    pub fn from_config(config: &DorisConfig, show_sql: bool, rewriter: Arc<AddressRewriter>) -> Self {
        let settings = PoolSettings {
            max_connections: DORIS_POOL_SIZE,
            default_port: DORIS_DEFAULT_PORT,
            default_charset: Some(DORIS_DEFAULT_CHARSET),
            show_sql,
        };

        let streaming_url = non_blank(&config.streaming_url).unwrap_or_default();

        Self {
            query: Arc::new(MysqlStore::new(
                "doris.query",
                ResourceKind::Analytical,
                Requirement::Optional,
                config.url.as_str(),
                "set doris.url or DORIS__URL",
                settings.clone(),
                rewriter.clone(),
            )),
            streaming: Arc::new(MysqlStore::new(
                "doris.streaming",
                ResourceKind::Analytical,
                Requirement::Optional,
                streaming_url,
                "set doris.streaming_url or DORIS__STREAMING_URL",
                settings,
                rewriter,
            )),
        }
    }

    pub fn query(&self) -> &Arc<MysqlStore> {
        &self.query
    }

    pub fn streaming(&self) -> &Arc<MysqlStore> {
        &self.streaming
    }

    /// Session on the query pool.
    pub async fn session(&self) -> Result<Session, ResourceError> {
        self.query.session().await
    }

    pub fn managed(&self) -> Vec<Arc<dyn ManagedResource>> {
        vec![
            self.query.clone() as Arc<dyn ManagedResource>,
            self.streaming.clone() as Arc<dyn ManagedResource>,
        ]
    }
}
