// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod http_client;
pub mod llm;
pub mod resources;
pub mod rewriter;
pub mod tunnel;

pub use http_client::{HttpTransport, RequestSpec, TransportError, TransportResponse};
pub use rewriter::AddressRewriter;
pub use tunnel::{SshTunnelConnector, TunnelRegistry};
