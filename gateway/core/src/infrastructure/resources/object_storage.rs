// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Object storage (Qiniu Kodo)
//!
//! No network client is kept: the gateway only signs upload tokens that
//! browsers and devices use to upload directly, and builds public download
//! URLs from the configured domain.
//!
//! # Upload token format
//!
//! ```text
//! encodedPolicy = urlsafe_base64({"scope":"<bucket>:<key>","deadline":<unix seconds>})
//! encodedSign   = urlsafe_base64(hmac_sha1(secret_key, encodedPolicy))
//! token         = access_key ":" encodedSign ":" encodedPolicy
//! ```

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use std::time::Duration;
use tracing::info;

use super::ResourceSlot;
use crate::domain::config::ObjectStorageConfig;
use crate::domain::resource::{ManagedResource, ResourceError, ResourceKind, SlotState};

const SLOT: &str = "object_storage.main";

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

type HmacSha1 = Hmac<Sha1>;

#[derive(Serialize)]
struct PutPolicy {
    scope: String,
    deadline: i64,
}

/// Upload-token signer bound to one bucket
#[derive(Clone)]
pub struct UploadSigner {
    access_key: String,
    secret_key: String,
    bucket: String,
    domain: Option<String>,
}

impl std::fmt::Debug for UploadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSigner")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl UploadSigner {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
        domain: Option<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            domain: domain.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Token allowing one upload of `key`, valid for `ttl` from now.
    pub fn upload_token(&self, key: &str, ttl: Duration) -> Result<String, ResourceError> {
        let deadline = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        self.upload_token_until(key, deadline)
    }

    pub fn upload_token_until(&self, key: &str, deadline: i64) -> Result<String, ResourceError> {
        let policy = PutPolicy {
            scope: format!("{}:{}", self.bucket, key),
            deadline,
        };
        let policy_json =
            serde_json::to_vec(&policy).map_err(|e| ResourceError::operation(SLOT, e))?;
        let encoded_policy = URL_SAFE.encode(policy_json);

        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ResourceError::operation(SLOT, e))?;
        mac.update(encoded_policy.as_bytes());
        let encoded_sign = URL_SAFE.encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}:{}:{}",
            self.access_key, encoded_sign, encoded_policy
        ))
    }

    /// Public URL of `key`, when a download domain is configured.
    pub fn build_url(&self, key: &str) -> Option<String> {
        let domain = self.domain.as_deref()?;
        Some(format!(
            "{}/{}",
            domain.trim_end_matches('/'),
            key.trim_start_matches('/')
        ))
    }
}

pub struct ObjectStorageStore {
    config: ObjectStorageConfig,
    slot: ResourceSlot<UploadSigner>,
}

impl ObjectStorageStore {
    pub fn from_config(config: &ObjectStorageConfig) -> Self {
        Self {
            config: config.clone(),
            slot: ResourceSlot::new(SLOT),
        }
    }

    pub async fn signer(&self) -> Result<UploadSigner, ResourceError> {
        self.slot
            .get_or_init(|| async {
                if !self.is_configured() {
                    return Err(ResourceError::not_configured(
                        SLOT,
                        "set object_storage.access_key, secret_key and bucket (QINIU__*)",
                    ));
                }
                info!(slot = SLOT, bucket = %self.config.bucket, "Object storage signer ready");
                Ok(UploadSigner::new(
                    self.config.access_key.trim(),
                    self.config.secret_key.trim(),
                    self.config.bucket.trim(),
                    Some(self.config.domain.clone()),
                ))
            })
            .await
    }
}

#[async_trait]
impl ManagedResource for ObjectStorageStore {
    fn name(&self) -> &str {
        SLOT
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::ObjectStorage
    }

    fn is_configured(&self) -> bool {
        [
            &self.config.access_key,
            &self.config.secret_key,
            &self.config.bucket,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }

    async fn state(&self) -> SlotState {
        self.slot.state()
    }

    async fn warm_up(&self) -> Result<(), ResourceError> {
        self.signer().await.map(|_| ())
    }

    async fn close(&self) {
        self.slot.close(|_signer| async {}).await;
    }
}
