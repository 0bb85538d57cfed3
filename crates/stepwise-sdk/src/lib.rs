// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stepwise SDK for embedding the orchestrator in another program.
//!
//! Re-exports the Orchestration Engine plus the three capability contracts
//! and their default implementations, so a host application needs only this
//! one crate to wire up an [`Engine`](stepwise_core::Engine).

pub use stepwise_ai::{AiClient, AiClientError, AiDecision, ContextUpdate, GeminiClient, Report, StubAiClient, FINISH};
pub use stepwise_core::{Engine, HealthRegistry, NextStep, OrchestratorError, Result, TransitionResult};
pub use stepwise_definitions::{DefinitionError, DefinitionService, MarkdownDefinitionService};
pub use stepwise_state::{PersistenceError, PersistenceRepository, SqliteStore, WorkflowInstance, WorkflowStatus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
