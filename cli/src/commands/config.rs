// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use relaygate_core::domain::config::{GatewayConfig, CONFIG_PATH_ENV};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const ANNOTATED_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration, credentials redacted
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./relaygate.yaml")]
        output: PathBuf,

        /// Include every section with comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(&output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./relaygate.yaml");
        println!("  4. ~/.relaygate/config.yaml");
        println!("  5. /etc/relaygate/config.yaml");
        match GatewayConfig::discover_config() {
            Some(found) if config_override.is_none() => {
                println!("  Using: {}", found.display().to_string().green())
            }
            None if config_override.is_none() => {
                println!("  Using: {}", "built-in defaults".yellow())
            }
            _ => {}
        }
        println!();
    }

    let config =
        GatewayConfig::load_or_default(config_override).context("Failed to load configuration")?;

    println!("{}", "Current configuration:".bold());
    println!();
    let entries = config.describe();
    let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in entries {
        let shown = if value == "(not set)" {
            value.dimmed().to_string()
        } else {
            value
        };
        println!("  {:width$}  {}", key, shown, width = width);
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config =
        GatewayConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    if config.mysql.main_url.trim().is_empty() {
        println!(
            "{}",
            "! mysql.main_url is not set; `serve` will refuse to start".yellow()
        );
    }
    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Template text for `generate`.
pub fn template(with_examples: bool) -> &'static str {
    if with_examples {
        ANNOTATED_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    }
}

fn generate(output: &Path, with_examples: bool) -> Result<()> {
    std::fs::write(output, template(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
