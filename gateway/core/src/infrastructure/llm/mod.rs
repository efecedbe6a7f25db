// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `ChatClient`/`VisionClient`
// traits and one provider's HTTP API, going through the shared transport.

mod compat;
pub mod dashscope;
pub mod dify;
pub mod openai;
pub mod registry;
pub mod volcengine;

pub use registry::LlmClientFactory;
