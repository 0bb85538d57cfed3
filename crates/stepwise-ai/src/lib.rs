// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! The AI Client (AIC) contract: prompt assembly for the engine's three
//! decision intents, response validation, and the two substitutable
//! implementations (a Gemini transport and a deterministic stub).

pub mod error;
pub mod gemini;
pub mod model;
pub mod prompt;
pub mod retry;
pub mod stub;
pub mod traits;

pub use error::{AiClientError, AiClientResult};
pub use gemini::GeminiClient;
pub use model::{AiDecision, ContextUpdate, Intent, Report};
pub use stub::StubAiClient;
pub use traits::{validate_next_step_name, validate_status_suggestion, AiClient, HistoryView, InstanceView};

/// Reserved `next_step_name` value denoting workflow completion.
pub const FINISH: &str = "FINISH";

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
