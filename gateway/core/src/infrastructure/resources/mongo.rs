// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Document store clients
//!
//! Two independent slots: `mongo.primary` and `mongo.secondary`. Each hands
//! out the client together with the default database named in its URI.
//!
//! Multi-host and `mongodb+srv://` URIs are never tunnelled; they reach the
//! driver unchanged. A tunnelled URI is pinned with `directConnection=true`
//! so the driver does not discover replica-set members behind the tunnel.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::{Client, Database};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::{require_setting, ResourceSlot};
use crate::domain::address::redact;
use crate::domain::config::{non_blank, MongoConfig};
use crate::domain::resource::{ManagedResource, ResourceError, ResourceKind, SlotState};
use crate::infrastructure::rewriter::AddressRewriter;

/// Client plus the URI's default database
#[derive(Clone)]
pub struct MongoHandle {
    pub client: Client,
    pub database: Database,
}

pub struct MongoStore {
    name: String,
    uri: String,
    hint: String,
    rewriter: Arc<AddressRewriter>,
    slot: ResourceSlot<MongoHandle>,
}

impl MongoStore {
    pub fn new(
        name: impl Into<String>,
        uri: impl Into<String>,
        hint: impl Into<String>,
        rewriter: Arc<AddressRewriter>,
    ) -> Self {
        let name = name.into();
        Self {
            slot: ResourceSlot::new(name.clone()),
            name,
            uri: uri.into(),
            hint: hint.into(),
            rewriter,
        }
    }

    pub async fn handle(&self) -> Result<MongoHandle, ResourceError> {
        self.slot.get_or_init(|| self.connect()).await
    }

    pub async fn database(&self) -> Result<Database, ResourceError> {
        self.handle().await.map(|h| h.database)
    }

    /// `{ping: 1}` against the default database.
    pub async fn ping(&self) -> Result<bool, ResourceError> {
        let database = self.database().await?;
        let reply = database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ResourceError::operation(&self.name, e))?;
        let ok = reply
            .get("ok")
            .and_then(|v| v.as_f64().or_else(|| v.as_i32().map(f64::from)))
            .unwrap_or(0.0);
        Ok(ok == 1.0)
    }

    async fn connect(&self) -> Result<MongoHandle, ResourceError> {
        let raw = require_setting(&self.uri, &self.name, &self.hint)?;
        let rewritten = self.rewriter.rewrite(raw).await?;
        let effective = if rewritten == raw {
            rewritten
        } else {
            pin_direct_connection(&rewritten)
        };
        let address = redact(&effective);

        let connect_error = |reason: String| ResourceError::Connect {
            slot: self.name.clone(),
            address: address.clone(),
            reason,
        };

        info!(slot = %self.name, url = %address, "Connecting MongoDB");
        let client = Client::with_uri_str(&effective)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        let database = client
            .default_database()
            .ok_or_else(|| connect_error("URI names no default database".to_string()))?;

        info!(slot = %self.name, database = %database.name(), "MongoDB client ready");
        Ok(MongoHandle { client, database })
    }
}

/// Add `directConnection=true` unless the URI already sets it.
fn pin_direct_connection(uri: &str) -> String {
    let Ok(mut url) = Url::parse(uri) else {
        return uri.to_string();
    };
    let already_set = url
        .query_pairs()
        .any(|(k, _)| k.eq_ignore_ascii_case("directConnection"));
    if already_set {
        return uri.to_string();
    }
    url.query_pairs_mut().append_pair("directConnection", "true");
    url.to_string()
}

#[async_trait]
impl ManagedResource for MongoStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Document
    }

    fn is_configured(&self) -> bool {
        !self.uri.trim().is_empty()
    }

    async fn state(&self) -> SlotState {
        self.slot.state()
    }

    async fn warm_up(&self) -> Result<(), ResourceError> {
        self.handle().await.map(|_| ())
    }

    async fn close(&self) {
        let name = self.name.clone();
        self.slot
            .close(|handle| async move {
                info!(slot = %name, "Closing MongoDB client");
                handle.client.shutdown().await;
            })
            .await;
    }
}

pub struct MongoRegistry {
    primary: Arc<MongoStore>,
    secondary: Arc<MongoStore>,
}

impl MongoRegistry {
    pub fn from_config(config: &MongoConfig, rewriter: Arc<AddressRewriter>) -> Self {
        Self {
            primary: Arc::new(MongoStore::new(
                "mongo.primary",
                config.primary_uri.as_str(),
                "set mongo.primary_uri or MONGO__PRIMARY_URI",
                rewriter.clone(),
            )),
            secondary: Arc::new(MongoStore::new(
                "mongo.secondary",
                non_blank(&config.secondary_uri).unwrap_or_default(),
                "set mongo.secondary_uri or MONGO__SECONDARY_URI",
                rewriter,
            )),
        }
    }

    pub fn primary(&self) -> &Arc<MongoStore> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<MongoStore> {
        &self.secondary
    }

    pub fn managed(&self) -> Vec<Arc<dyn ManagedResource>> {
        vec![
            self.primary.clone() as Arc<dyn ManagedResource>,
            self.secondary.clone() as Arc<dyn ManagedResource>,
        ]
    }
}
