// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! relaygate CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers, logging setup and `.env` loading for the `relaygate` binary

pub mod commands;
pub mod env_files;
pub mod logging;
