// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `relaygate serve`
//!
//! Builds the gateway context, warms up mandatory resources, serves the HTTP
//! API until Ctrl+C or SIGTERM, then closes resources and releases tunnels.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use relaygate_core::presentation::router;
use relaygate_core::{GatewayConfig, GatewayContext};

pub async fn run(config: GatewayConfig, lazy: bool) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        app = %config.app_name,
        env = %config.env,
        tunnel = config.ssh_tunnel.enabled,
        "relaygate starting"
    );
    for (key, value) in config.describe() {
        info!("  {} = {}", key, value);
    }

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let ctx = Arc::new(GatewayContext::build(config).context("Failed to build gateway context")?);

    if let Err(e) = ctx.warm_up(lazy).await {
        ctx.shutdown().await;
        return Err(e).context("Failed to initialize required resources");
    }

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            ctx.shutdown().await;
            return Err(e).with_context(|| format!("Failed to bind to {}", addr));
        }
    };
    info!("relaygate listening on {}", addr);

    let served = axum::serve(listener, router(ctx.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("relaygate shutting down");
    ctx.shutdown().await;

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
