// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resource
//!
//! Resource kinds, client-slot lifecycle and the error taxonomy shared by
//! every resource registry.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Contracts implemented by `infrastructure/resources/`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::tunnel::TunnelError;

/// Category of external dependency fronted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Relational,
    Cache,
    Document,
    Analytical,
    Search,
    ObjectStorage,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Cache => "cache",
            Self::Document => "document",
            Self::Analytical => "analytical",
            Self::Search => "search",
            Self::ObjectStorage => "object_storage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a blank connection string stops the process from starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Initialized during warm-up; blank configuration aborts startup.
    Mandatory,
    /// Initialized on first request; blank configuration only fails that request.
    Optional,
}

/// Lifecycle of a resource client slot.
///
/// `Uninitialized -> Ready -> Closed`, with `Closed` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Uninitialized,
    Ready,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("{slot} is not configured: {hint}")]
    NotConfigured { slot: String, hint: String },

    #[error("{0} has been closed")]
    Closed(String),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("Failed to connect {slot} at {address}: {reason}")]
    Connect {
        slot: String,
        /// Credential-free rendering of the effective address
        address: String,
        reason: String,
    },

    #[error("{slot} operation failed: {reason}")]
    Operation { slot: String, reason: String },
}

impl ResourceError {
    pub fn not_configured(slot: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotConfigured {
            slot: slot.into(),
            hint: hint.into(),
        }
    }

    pub fn operation(slot: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Operation {
            slot: slot.into(),
            reason: reason.to_string(),
        }
    }
}

/// A resource registry the gateway closes during shutdown.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Slot name used in logs and errors, e.g. `mysql.main`
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    fn requirement(&self) -> Requirement {
        Requirement::Optional
    }

    /// True when the slot has something to connect to.
    fn is_configured(&self) -> bool;

    async fn state(&self) -> SlotState;

    /// Build the client now instead of on first request.
    async fn warm_up(&self) -> Result<(), ResourceError>;

    /// Release pools and sockets; no-op when never initialized or already closed.
    async fn close(&self);
}
