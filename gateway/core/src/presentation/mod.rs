// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`relaygate-core`)
//!
//! HTTP surface over [`crate::application::context::GatewayContext`]. Handlers
//! only translate requests and errors; resources and clients come from the
//! context.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Axum router, middleware and route handlers |
//! | [`envelope`] | `{code, msg, data}` envelope and error-to-response mapping |

pub mod api;
pub mod envelope;

pub use api::router;
pub use envelope::{ApiError, ApiResponse};
