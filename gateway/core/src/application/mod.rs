// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod lifecycle;

pub use context::GatewayContext;
pub use lifecycle::ResourceLifecycle;
