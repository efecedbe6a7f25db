// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Resource Client Registries
//
// One registry per resource kind. Each named slot reads its raw connection
// string, routes it through the address rewriter on first use, builds the
// driver client and memoizes it until shutdown.

pub mod doris;
pub mod mongo;
pub mod mysql;
pub mod object_storage;
pub mod redis;
pub mod search;
pub mod slot;

pub use doris::DorisRegistry;
pub use mongo::{MongoHandle, MongoRegistry, MongoStore};
pub use mysql::{MysqlRegistry, MysqlStore, Session};
pub use object_storage::{ObjectStorageStore, UploadSigner};
pub use redis::RedisStore;
pub use search::{SearchClient, SearchStore};
pub use slot::ResourceSlot;

use crate::domain::resource::ResourceError;

/// Raw setting, or `NotConfigured` naming the key to set.
pub(crate) fn require_setting<'a>(
    raw: &'a str,
    slot: &str,
    hint: &str,
) -> Result<&'a str, ResourceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ResourceError::not_configured(slot, hint));
    }
    Ok(trimmed)
}
