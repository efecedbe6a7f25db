// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tunnel
//!
//! Domain contracts for SSH-tunnelled connectivity.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tunnel identity, jump-host policy and the broker/connector seams
//!
//! The broker ([`TunnelBroker`]) is what the address rewriter talks to; the
//! connector ([`TunnelConnector`]) is what actually opens a forwarding session.
//! Implementations live in `infrastructure/tunnel/`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use super::config::SshTunnelConfig;

/// Identity of a tunnel: the remote endpoint reached through the jump host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelKey {
    pub remote_host: String,
    pub remote_port: u16,
}

impl TunnelKey {
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            remote_host: remote_host.into(),
            remote_port,
        }
    }
}

impl fmt::Display for TunnelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote_host, self.remote_port)
    }
}

/// Jump-host credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct JumpHost {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// Expected SHA-256 host key fingerprint (`SHA256:...`); unpinned when absent
    pub host_key_fingerprint: Option<String>,
}

impl fmt::Debug for JumpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JumpHost")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .finish()
    }
}

impl fmt::Display for JumpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Process-wide tunnel policy, read once at startup.
#[derive(Debug, Clone)]
pub struct TunnelPolicy {
    enabled: bool,
    jump_host: JumpHost,
    connect_timeout: Duration,
}

impl TunnelPolicy {
    pub fn from_config(config: &SshTunnelConfig) -> Self {
        Self {
            enabled: config.enabled,
            jump_host: JumpHost {
                host: config.ssh_host.trim().to_string(),
                port: config.ssh_port,
                username: config.ssh_username.trim().to_string(),
                password: config.ssh_password.clone(),
                host_key_fingerprint: config
                    .host_key_fingerprint
                    .clone()
                    .filter(|f| !f.trim().is_empty()),
            },
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    pub fn disabled() -> Self {
        Self::from_config(&SshTunnelConfig::default())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Jump host to tunnel through, or why tunnelling does not apply.
    pub fn jump_host(&self) -> Result<&JumpHost, TunnelError> {
        if !self.enabled {
            return Err(TunnelError::PolicyDisabled);
        }

        let mut missing = Vec::new();
        if self.jump_host.host.is_empty() {
            missing.push("ssh_host");
        }
        if self.jump_host.username.is_empty() {
            missing.push("ssh_username");
        }
        if self.jump_host.password.is_empty() {
            missing.push("ssh_password");
        }
        if self.jump_host.port == 0 {
            missing.push("ssh_port");
        }
        if !missing.is_empty() {
            return Err(TunnelError::PolicyMisconfigured(format!(
                "ssh_tunnel.enabled=true but {} not set",
                missing.join(", ")
            )));
        }

        Ok(&self.jump_host)
    }
}

/// Errors raised by the tunnel layer
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TunnelError {
    /// Not a failure: tunnelling is off and callers pass addresses through.
    #[error("SSH tunnelling is disabled")]
    PolicyDisabled,

    #[error("SSH tunnel policy misconfigured: {0}")]
    PolicyMisconfigured(String),

    #[error("Failed to establish SSH tunnel to {key} via {jump_host}: {reason}")]
    Establish {
        key: TunnelKey,
        jump_host: String,
        reason: String,
    },
}

/// Where resource registries obtain local endpoints for remote addresses.
#[async_trait]
pub trait TunnelBroker: Send + Sync {
    /// Local loopback endpoint forwarding to `key`, creating the tunnel on
    /// first use and recreating it when found inactive.
    async fn acquire(&self, key: &TunnelKey) -> Result<SocketAddr, TunnelError>;

    /// Stop and forget every tunnel. Safe to call repeatedly.
    async fn release_all(&self);
}

/// A running forwarding session bound to a local port.
#[async_trait]
pub trait TunnelForwarder: Send + Sync {
    fn local_addr(&self) -> SocketAddr;

    /// May turn false at any time if the underlying session drops.
    fn is_active(&self) -> bool;

    async fn stop(&self) -> Result<(), TunnelError>;
}

/// Opens forwarding sessions through a jump host.
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    /// Establish a session for `key`; resolves once the local port is bound
    /// and the jump host accepted the credentials.
    async fn open(
        &self,
        jump_host: &JumpHost,
        key: &TunnelKey,
    ) -> Result<Box<dyn TunnelForwarder>, TunnelError>;
}
