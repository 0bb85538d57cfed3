// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Workflow Definition Service: discovers, parses, validates, and caches
//! workflow text trees (§4.1).
//!
//! # Examples
//!
//! ```no_run
//! # use stepwise_definitions::{MarkdownDefinitionService, DefinitionService};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MarkdownDefinitionService::new("./workflows");
//! let names = service.list_workflows().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod service;

pub use error::{DefinitionError, DefinitionResult};
pub use model::WorkflowDefinition;
pub use service::{DefinitionService, MarkdownDefinitionService};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
