// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the AI client contract.

use thiserror::Error;

/// Errors surfaced by an [`crate::AiClient`] implementation.
#[derive(Error, Debug)]
pub enum AiClientError {
    /// The request did not complete within the configured timeout.
    #[error("AI service request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The transport returned a non-2xx response.
    #[error("AI service returned HTTP {status}: {body}")]
    ApiError {
        /// HTTP status code returned by the transport.
        status: u16,
        /// Response body, truncated if large, for diagnostics.
        body: String,
    },

    /// The model's structured response failed schema validation, or named a
    /// step that does not exist in the current workflow.
    #[error("AI response failed validation: {0}")]
    InvalidResponse(String),

    /// The provider flagged the request or response for safety/moderation reasons.
    #[error("AI service flagged content: {0}")]
    Safety(String),

    /// Local configuration problem (missing API key, bad base URL, ...).
    #[error("AI client configuration error: {0}")]
    Configuration(String),

    /// Underlying HTTP transport failure not otherwise classified.
    #[error("AI transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failed to (de)serialize a prompt or response payload.
    #[error("AI payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AiClientError {
    /// Whether the wire-level retry policy (§4.4) should retry this failure.
    ///
    /// One immediate retry on timeout and on 5xx API errors; everything else
    /// (4xx, invalid response, safety) is not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiClientError::Timeout(_) => true,
            AiClientError::ApiError { status, .. } => *status >= 500,
            AiClientError::InvalidResponse(_)
            | AiClientError::Safety(_)
            | AiClientError::Configuration(_)
            | AiClientError::Serialization(_) => false,
            AiClientError::Transport(_) => true,
        }
    }
}

/// Result type for AI client operations.
pub type AiClientResult<T> = Result<T, AiClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        assert!(AiClientError::Timeout(std::time::Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn server_error_is_retryable() {
        assert!(AiClientError::ApiError { status: 503, body: String::new() }.is_retryable());
        assert!(AiClientError::ApiError { status: 500, body: String::new() }.is_retryable());
    }

    #[test]
    fn client_error_is_not_retryable() {
        assert!(!AiClientError::ApiError { status: 404, body: String::new() }.is_retryable());
        assert!(!AiClientError::ApiError { status: 429, body: String::new() }.is_retryable());
    }

    #[test]
    fn invalid_response_and_safety_are_not_retryable() {
        assert!(!AiClientError::InvalidResponse("bad json".into()).is_retryable());
        assert!(!AiClientError::Safety("blocked".into()).is_retryable());
    }
}
