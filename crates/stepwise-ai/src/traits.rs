// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! The AI Client capability contract.

use crate::error::AiClientResult;
use crate::model::AiDecision;
use async_trait::async_trait;

/// Persisted instance fields the AI call needs to see, rendered as JSON in
/// the prompt (§4.4 step 3). Kept intentionally small and decoupled from
/// `stepwise-state`'s row type so this crate has no upward dependency.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstanceView<'a> {
    pub instance_id: &'a str,
    pub workflow_name: &'a str,
    pub current_step_name: Option<&'a str>,
    pub status: &'a str,
    pub context: &'a serde_json::Value,
}

/// One entry of recent history, rendered most-recent-first in the prompt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryView<'a> {
    pub step_name: &'a str,
    pub outcome_status: &'a str,
    pub user_report: &'a serde_json::Value,
    pub timestamp: &'a str,
}

/// Capability contract for the AI Client component (§4.4).
///
/// Implementations own prompt assembly, transport, wire-level retry, and
/// response validation. The engine treats any implementation — the real
/// transport or the deterministic stub — indistinguishably.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Determine the first step of a freshly started workflow.
    async fn determine_first_step(
        &self,
        workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
    ) -> AiClientResult<AiDecision>;

    /// Determine the next step given the client's report on the current step.
    #[allow(clippy::too_many_arguments)]
    async fn determine_next_step(
        &self,
        workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
        instance: InstanceView<'_>,
        report: &crate::model::Report,
        recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision>;

    /// Reconcile a client's assumed step against the persisted step and
    /// determine the next step (resume path).
    #[allow(clippy::too_many_arguments)]
    async fn reconcile_and_determine_next_step(
        &self,
        workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
        instance: InstanceView<'_>,
        assumed_current_step_name: &str,
        report: &crate::model::Report,
        recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision>;

    /// A short name identifying this implementation, for logging.
    fn name(&self) -> &str;

    /// Cheap reachability check, used by the observability health registry.
    /// Default implementation assumes the client is healthy; real transports
    /// should override this with a low-cost check rather than a full model call.
    async fn health_check(&self) -> AiClientResult<()> {
        Ok(())
    }
}

/// `next_step_name` must be `FINISH` or one of the workflow's canonical step
/// IDs (the resolved Open Question, SPEC_FULL.md §4.4 and §9).
pub fn validate_next_step_name(next_step_name: &str, known_steps: &[String]) -> AiClientResult<()> {
    if next_step_name == crate::FINISH {
        return Ok(());
    }
    if known_steps.iter().any(|s| s == next_step_name) {
        return Ok(());
    }
    Err(crate::error::AiClientError::InvalidResponse(format!(
        "model named unknown step '{next_step_name}', not in workflow's step list"
    )))
}

/// `status_suggestion`, when present, must be one of the four status values.
pub fn validate_status_suggestion(status_suggestion: &Option<String>) -> AiClientResult<()> {
    match status_suggestion {
        None => Ok(()),
        Some(s) if matches!(s.as_str(), "RUNNING" | "SUSPENDED" | "COMPLETED" | "FAILED") => Ok(()),
        Some(other) => Err(crate::error::AiClientError::InvalidResponse(format!(
            "status_suggestion '{other}' is not a recognized status"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_always_validates() {
        assert!(validate_next_step_name("FINISH", &[]).is_ok());
    }

    #[test]
    fn known_step_validates() {
        let steps = vec!["greet".to_string(), "farewell".to_string()];
        assert!(validate_next_step_name("farewell", &steps).is_ok());
    }

    #[test]
    fn hallucinated_step_is_rejected() {
        let steps = vec!["greet".to_string()];
        let err = validate_next_step_name("nonexistent", &steps).unwrap_err();
        assert!(matches!(err, crate::error::AiClientError::InvalidResponse(_)));
    }

    #[test]
    fn status_suggestion_validation() {
        assert!(validate_status_suggestion(&None).is_ok());
        assert!(validate_status_suggestion(&Some("FAILED".to_string())).is_ok());
        assert!(validate_status_suggestion(&Some("bogus".to_string())).is_err());
    }
}
