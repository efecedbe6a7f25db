// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # relaygate
//!
//! The `relaygate` binary runs the resource gateway: one HTTP API in front of
//! relational, cache, document, analytical, search and object-storage
//! backends, with optional SSH tunnelling to private networks.
//!
//! ## Commands
//!
//! - `relaygate serve [--lazy]` - Run the gateway until Ctrl+C / SIGTERM
//! - `relaygate config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info};

use relaygate_cli::commands::{self, ConfigCommand};
use relaygate_cli::env_files::load_env_files;
use relaygate_cli::logging::{init_logging, LogFormat};
use relaygate_core::GatewayConfig;

/// relaygate - connectivity and credential broker for backend resources
#[derive(Parser)]
#[command(name = "relaygate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP bind host (overrides server.bind_address)
    #[arg(long, global = true, env = "RELAYGATE_HOST")]
    host: Option<String>,

    /// HTTP port (overrides server.port)
    #[arg(long, global = true, env = "RELAYGATE_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, global = true, env = "RELAYGATE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway HTTP server
    #[command(name = "serve")]
    Serve {
        /// Skip connecting mandatory resources at startup
        #[arg(long)]
        lazy: bool,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let env_files = load_env_files(&cwd)?;

    match cli.command {
        Some(Commands::Serve { lazy }) => {
            let mut config = GatewayConfig::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            if let Some(host) = cli.host {
                config.server.bind_address = host;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }

            let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
            init_logging(&level, LogFormat::parse(&config.logging.format))?;
            for file in &env_files {
                debug!("Loaded environment from {}", file.display());
            }
            info!("relaygate {}", env!("CARGO_PKG_VERSION"));

            commands::serve::run(config, lazy).await
        }
        Some(Commands::Config { command }) => {
            let level = cli.log_level.as_deref().unwrap_or("warn");
            init_logging(level, LogFormat::Compact)?;
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
