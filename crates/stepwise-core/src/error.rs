// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the Orchestration Engine (§4.3, §7).

use stepwise_ai::AiClientError;
use stepwise_definitions::DefinitionError;
use stepwise_state::PersistenceError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Aggregates the three leaf component error taxonomies plus the engine's
/// own transition-level faults.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Propagated from the Definition Service.
    #[error("workflow definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Propagated from the Persistence Repository.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Propagated from the AI Client.
    #[error("AI client error: {0}")]
    AiClient(#[from] AiClientError),

    /// `advance`/`resume` targeted an instance that does not exist.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Engine-level validation failure not attributable to a leaf component.
    #[error("validation error: {0}")]
    Validation(String),
}

impl OrchestratorError {
    /// True for faults that are transient at the engine's call boundary and
    /// may succeed if the whole transition is retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AiClient(e) => e.is_retryable(),
            Self::Persistence(PersistenceError::Connection(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_client_error_retryability_is_forwarded() {
        let err = OrchestratorError::AiClient(AiClientError::Timeout(std::time::Duration::from_secs(1)));
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_error_is_not_retryable() {
        let err = OrchestratorError::Validation("bad input".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn persistence_connection_error_is_retryable() {
        let err = OrchestratorError::Persistence(PersistenceError::Connection("pool exhausted".to_string()));
        assert!(err.is_retryable());
    }
}
