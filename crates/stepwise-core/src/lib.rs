// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stepwise Orchestrator Core - the Orchestration Engine that ties together
//! the Definition Service, the Persistence Repository, and an AI Client
//! behind the `start`/`advance`/`resume` state machine (§2, §4.3).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepwise_core::Engine;
//! use stepwise_ai::StubAiClient;
//! use stepwise_definitions::MarkdownDefinitionService;
//! use stepwise_state::SqliteStore;
//!
//! # async fn run() -> stepwise_core::Result<()> {
//! let definitions = Arc::new(MarkdownDefinitionService::new("./workflows"));
//! let persistence = Arc::new(SqliteStore::new("./state.db", None).await?);
//! let ai_client = Arc::new(StubAiClient::new());
//! let engine = Engine::new(definitions, persistence, ai_client, 5);
//!
//! let result = engine.start("ONBOARD_USER", None).await?;
//! println!("next step: {}", result.next_step.step_name);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod health;
pub mod locks;
pub mod metrics;
pub mod model;

pub use context::{apply_context_updates, merge_context};
pub use engine::Engine;
pub use error::{OrchestratorError, Result};
pub use health::{AiClientHealthCheck, ComponentHealth, HealthCheck, HealthCheckResult, HealthRegistry, HealthStatus, PersistenceHealthCheck};
pub use locks::InstanceLockRegistry;
pub use model::{report_status, NextStep, TransitionResult, COMPLETION_MESSAGE};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
