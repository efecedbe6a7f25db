// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SSH Local Port Forwarding
//!
//! Opens one SSH session per tunnel key against the jump host, binds an
//! ephemeral port on `127.0.0.1` and pipes every accepted connection through a
//! `direct-tcpip` channel to the remote endpoint.
//!
//! Only password authentication is supported. Host keys are accepted unless
//! `ssh_tunnel.host_key_fingerprint` pins one.

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::ssh_key::{HashAlg, PublicKey};
use russh::Disconnect;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::address::LOOPBACK_HOST;
use crate::domain::tunnel::{JumpHost, TunnelConnector, TunnelError, TunnelForwarder, TunnelKey};

/// Client-side session handler for the jump host
struct JumpHostHandler {
    expected_fingerprint: Option<String>,
}

impl client::Handler for JumpHostHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let Some(expected) = &self.expected_fingerprint else {
            return Ok(true);
        };
        let actual = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        if actual != *expected {
            warn!(expected = %expected, actual = %actual, "Jump host key fingerprint mismatch");
            return Ok(false);
        }
        Ok(true)
    }
}

/// Opens russh-backed forwarders.
pub struct SshTunnelConnector {
    config: Arc<client::Config>,
}

impl SshTunnelConnector {
    pub fn new() -> Self {
        let config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshTunnelConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelConnector for SshTunnelConnector {
    async fn open(
        &self,
        jump_host: &JumpHost,
        key: &TunnelKey,
    ) -> Result<Box<dyn TunnelForwarder>, TunnelError> {
        let establish_error = |reason: String| TunnelError::Establish {
            key: key.clone(),
            jump_host: jump_host.to_string(),
            reason,
        };

        let handler = JumpHostHandler {
            expected_fingerprint: jump_host.host_key_fingerprint.clone(),
        };

        let mut session = client::connect(
            self.config.clone(),
            (jump_host.host.as_str(), jump_host.port),
            handler,
        )
        .await
        .map_err(|e| establish_error(format!("connect: {}", e)))?;

        let auth = session
            .authenticate_password(jump_host.username.clone(), jump_host.password.clone())
            .await
            .map_err(|e| establish_error(format!("authenticate: {}", e)))?;
        if !auth.success() {
            return Err(establish_error("password authentication rejected".to_string()));
        }

        let listener = TcpListener::bind((LOOPBACK_HOST, 0))
            .await
            .map_err(|e| establish_error(format!("bind local port: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| establish_error(format!("local address: {}", e)))?;

        let session = Arc::new(session);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            session.clone(),
            key.clone(),
            shutdown.clone(),
        ));

        debug!(key = %key, local = %local_addr, "SSH forwarder listening");

        Ok(Box::new(SshForwarder {
            key: key.clone(),
            local_addr,
            session,
            shutdown,
            task,
        }))
    }
}

/// A live jump-host session plus its local listener task.
pub struct SshForwarder {
    key: TunnelKey,
    local_addr: SocketAddr,
    session: Arc<Handle<JumpHostHandler>>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

#[async_trait]
impl TunnelForwarder for SshForwarder {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.task.is_finished() && !self.session.is_closed()
    }

    async fn stop(&self) -> Result<(), TunnelError> {
        self.shutdown.cancel();
        self.task.abort();
        if self.session.is_closed() {
            return Ok(());
        }
        // Session already torn down on the far side is fine here
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(key = %self.key, error = %e, "SSH disconnect returned an error");
        }
        Ok(())
    }
}

impl Drop for SshForwarder {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    session: Arc<Handle<JumpHostHandler>>,
    key: TunnelKey,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    tokio::spawn(pipe(
                        socket,
                        peer,
                        session.clone(),
                        key.clone(),
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Tunnel listener accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
    info!(key = %key, "SSH forwarder listener closed");
}

async fn pipe(
    mut socket: TcpStream,
    peer: SocketAddr,
    session: Arc<Handle<JumpHostHandler>>,
    key: TunnelKey,
    shutdown: CancellationToken,
) {
    let channel = match session
        .channel_open_direct_tcpip(
            key.remote_host.clone(),
            u32::from(key.remote_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await
    {
        Ok(channel) => channel,
        Err(e) => {
            warn!(key = %key, peer = %peer, error = %e, "Opening direct-tcpip channel failed");
            return;
        }
    };

    let mut remote = channel.into_stream();
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::io::copy_bidirectional(&mut socket, &mut remote) => match result {
            Ok((up, down)) => debug!(key = %key, peer = %peer, up, down, "Tunnel connection closed"),
            Err(e) => debug!(key = %key, peer = %peer, error = %e, "Tunnel connection ended with error"),
        },
    }
}
