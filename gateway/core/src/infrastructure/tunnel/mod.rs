// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// SSH Tunnel Infrastructure
//
// `TunnelRegistry` implements the `TunnelBroker` seam and owns every live
// forwarder; `SshTunnelConnector` opens them through a jump host with russh.

pub mod registry;
pub mod ssh;

pub use registry::TunnelRegistry;
pub use ssh::SshTunnelConnector;
