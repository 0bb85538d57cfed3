// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistence Repository: durable storage for workflow instances and their
//! append-only history (§4.2).
//!
//! # Examples
//!
//! ```no_run
//! # use stepwise_state::{SqliteStore, PersistenceRepository, WorkflowInstance, WorkflowStatus};
//! # use serde_json::json;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new("./workflows.db", None).await?;
//! let instance = WorkflowInstance::new("GREET", Some("greet".to_string()), WorkflowStatus::Running, json!({}));
//! store.create_instance(&instance).await?;
//! store.health_check().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod sqlite;
pub mod traits;

pub use error::{PersistenceError, PersistenceResult};
pub use model::{HistoryEntry, NewHistoryEntry, WorkflowInstance, WorkflowStatus, FINISH};
pub use sqlite::SqliteStore;
pub use traits::PersistenceRepository;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
