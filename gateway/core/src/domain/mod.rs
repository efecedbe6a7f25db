// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod address;
pub mod config;
pub mod llm;
pub mod resource;
pub mod tunnel;
