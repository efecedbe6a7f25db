// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Relaygate core
//!
//! Connectivity and credential brokering for the relaygate resource gateway:
//! SSH tunnel registry, connection-string rewriting, lazily initialized
//! resource clients, language-model clients and the HTTP surface that exposes
//! them behind a single response envelope.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Wires domain contracts to infrastructure adapters

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::context::GatewayContext;
pub use domain::config::GatewayConfig;
