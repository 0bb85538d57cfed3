// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Orchestration Engine: `start`, `advance`, and `resume` (§4.3).

use crate::context::{apply_context_updates, merge_context};
use crate::error::{OrchestratorError, Result};
use crate::locks::InstanceLockRegistry;
use crate::metrics;
use crate::model::{report_status, NextStep, TransitionResult, COMPLETION_MESSAGE};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use stepwise_ai::{AiClient, HistoryView, InstanceView, Report};
use stepwise_definitions::DefinitionService;
use stepwise_state::{NewHistoryEntry, PersistenceRepository, WorkflowInstance, WorkflowStatus, FINISH};
use tracing::{info, instrument, warn};

/// Combines the three leaf components behind the state-machine rules that
/// own transitions, history, and completion/failure semantics (§2, §4.3).
pub struct Engine {
    definitions: Arc<dyn DefinitionService>,
    persistence: Arc<dyn PersistenceRepository>,
    ai_client: Arc<dyn AiClient>,
    locks: InstanceLockRegistry,
    history_limit: u32,
}

impl Engine {
    pub fn new(
        definitions: Arc<dyn DefinitionService>,
        persistence: Arc<dyn PersistenceRepository>,
        ai_client: Arc<dyn AiClient>,
        history_limit: u32,
    ) -> Self {
        Self { definitions, persistence, ai_client, locks: InstanceLockRegistry::new(), history_limit }
    }

    /// Periodic housekeeping hook for the lock registry (§5); callers may
    /// invoke this on a timer so uncontended locks for long-finished
    /// instances do not accumulate for the life of the process.
    pub fn evict_idle_locks(&self) {
        self.locks.evict_uncontended();
    }

    #[instrument(skip(self, initial_context))]
    pub async fn start(&self, workflow_name: &str, initial_context: Option<Value>) -> Result<TransitionResult> {
        let started_at = Instant::now();
        let result = self.start_inner(workflow_name, initial_context).await;
        metrics::record_transition("start", started_at.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn start_inner(&self, workflow_name: &str, initial_context: Option<Value>) -> Result<TransitionResult> {
        let full_blob = self.definitions.get_full_definition_blob(workflow_name).await?;
        let known_steps = self.definitions.get_step_list(workflow_name).await?;

        let decision = self.ai_client.determine_first_step(workflow_name, &full_blob, &known_steps).await;
        metrics::record_ai_call("first_step", decision.is_ok());
        let decision = decision?;

        let base_context = initial_context.unwrap_or_else(|| Value::Object(Default::default()));
        let context = apply_context_updates(&base_context, &decision.updated_context);

        let status = derive_status(&decision.next_step_name, decision.status_suggestion.as_deref(), WorkflowStatus::Running);

        let instance = WorkflowInstance::new(workflow_name, Some(decision.next_step_name.clone()), status, context.clone());
        self.persistence.create_instance(&instance).await?;

        info!(instance_id = %instance.instance_id, workflow_name, next_step = %decision.next_step_name, "workflow started");

        let next_step = self.build_next_step(workflow_name, &decision.next_step_name, status).await?;

        Ok(TransitionResult { instance_id: instance.instance_id, next_step, current_context: context })
    }

    #[instrument(skip(self, report, context_updates))]
    pub async fn advance(&self, instance_id: &str, report: Value, context_updates: Option<Value>) -> Result<TransitionResult> {
        let started_at = Instant::now();
        let result = self.advance_inner(instance_id, report, context_updates).await;
        metrics::record_transition("advance", started_at.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn advance_inner(&self, instance_id: &str, report: Value, context_updates: Option<Value>) -> Result<TransitionResult> {
        let lock = self.locks.lock_for(instance_id);
        let _guard = lock.lock().await;

        let state = self.persistence.get_instance(instance_id).await?;

        if state.status.is_terminal() {
            return self.terminal_result(&state).await;
        }

        let working_context = match context_updates {
            Some(updates) => merge_context(&state.context, &updates),
            None => state.context.clone(),
        };

        let outcome_status = report_status(&report);
        let prior_step = state.current_step_name.clone().unwrap_or_default();

        let full_blob = self.mark_failed_on_definition_error(&state, self.definitions.get_full_definition_blob(&state.workflow_name).await).await?;
        let known_steps = self.mark_failed_on_definition_error(&state, self.definitions.get_step_list(&state.workflow_name).await).await?;
        let recent = self.persistence.get_history(instance_id, Some(self.history_limit)).await?;

        let ai_report: Report = serde_json::from_value(report.clone()).unwrap_or(Report {
            status: outcome_status.clone(),
            details: Some(report.clone()),
            message: None,
            error: None,
        });

        let instance_view = InstanceView {
            instance_id: &state.instance_id,
            workflow_name: &state.workflow_name,
            current_step_name: state.current_step_name.as_deref(),
            status: &state.status.to_string(),
            context: &working_context,
        };
        let timestamps: Vec<String> = recent.iter().map(|entry| entry.timestamp.to_rfc3339()).collect();
        let history_views: Vec<HistoryView> = recent
            .iter()
            .zip(timestamps.iter())
            .map(|(entry, timestamp)| HistoryView {
                step_name: &entry.step_name,
                outcome_status: &entry.outcome_status,
                user_report: &entry.user_report,
                timestamp,
            })
            .collect();

        let decision = self
            .ai_client
            .determine_next_step(&state.workflow_name, &full_blob, &known_steps, instance_view, &ai_report, &history_views)
            .await;
        metrics::record_ai_call("next_step", decision.is_ok());
        let decision = decision?;

        let new_context = apply_context_updates(&working_context, &decision.updated_context);
        let new_status = derive_status(&decision.next_step_name, decision.status_suggestion.as_deref(), state.status);

        let mut updated_instance = state.clone();
        updated_instance.current_step_name = Some(decision.next_step_name.clone());
        updated_instance.status = new_status;
        updated_instance.context = new_context.clone();
        if new_status == WorkflowStatus::Completed && updated_instance.completed_at.is_none() {
            updated_instance.completed_at = Some(chrono::Utc::now());
        }

        let history = NewHistoryEntry {
            instance_id: instance_id.to_string(),
            step_name: prior_step,
            user_report: report,
            outcome_status,
            determined_next_step: Some(decision.next_step_name.clone()),
        };

        self.persistence.commit_transition(history, &updated_instance).await?;

        info!(instance_id, next_step = %decision.next_step_name, status = %new_status, "advanced");

        let next_step = self.build_next_step(&state.workflow_name, &decision.next_step_name, new_status).await?;
        Ok(TransitionResult { instance_id: instance_id.to_string(), next_step, current_context: new_context })
    }

    #[instrument(skip(self, report, context_updates))]
    pub async fn resume(&self, instance_id: &str, assumed_step_name: &str, report: Value, context_updates: Option<Value>) -> Result<TransitionResult> {
        let started_at = Instant::now();
        let result = self.resume_inner(instance_id, assumed_step_name, report, context_updates).await;
        metrics::record_transition("resume", started_at.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn resume_inner(&self, instance_id: &str, assumed_step_name: &str, report: Value, context_updates: Option<Value>) -> Result<TransitionResult> {
        let lock = self.locks.lock_for(instance_id);
        let _guard = lock.lock().await;

        let state = self.persistence.get_instance(instance_id).await?;

        if state.status.is_terminal() {
            return self.terminal_result(&state).await;
        }

        let working_context = match context_updates {
            Some(updates) => merge_context(&state.context, &updates),
            None => state.context.clone(),
        };

        let full_blob = self.mark_failed_on_definition_error(&state, self.definitions.get_full_definition_blob(&state.workflow_name).await).await?;
        let known_steps = self.mark_failed_on_definition_error(&state, self.definitions.get_step_list(&state.workflow_name).await).await?;
        let recent = self.persistence.get_history(instance_id, Some(self.history_limit)).await?;

        let ai_report: Report = serde_json::from_value(report.clone()).unwrap_or(Report {
            status: report_status(&report),
            details: Some(report.clone()),
            message: None,
            error: None,
        });

        let instance_view = InstanceView {
            instance_id: &state.instance_id,
            workflow_name: &state.workflow_name,
            current_step_name: state.current_step_name.as_deref(),
            status: &state.status.to_string(),
            context: &working_context,
        };
        let timestamps: Vec<String> = recent.iter().map(|entry| entry.timestamp.to_rfc3339()).collect();
        let history_views: Vec<HistoryView> = recent
            .iter()
            .zip(timestamps.iter())
            .map(|(entry, timestamp)| HistoryView {
                step_name: &entry.step_name,
                outcome_status: &entry.outcome_status,
                user_report: &entry.user_report,
                timestamp,
            })
            .collect();

        let decision = self
            .ai_client
            .reconcile_and_determine_next_step(
                &state.workflow_name,
                &full_blob,
                &known_steps,
                instance_view,
                assumed_step_name,
                &ai_report,
                &history_views,
            )
            .await;
        metrics::record_ai_call("reconcile", decision.is_ok());
        let decision = decision?;

        let new_context = apply_context_updates(&working_context, &decision.updated_context);
        let new_status = derive_status(&decision.next_step_name, decision.status_suggestion.as_deref(), state.status);

        let mut updated_instance = state.clone();
        updated_instance.current_step_name = Some(decision.next_step_name.clone());
        updated_instance.status = new_status;
        updated_instance.context = new_context.clone();
        if new_status == WorkflowStatus::Completed && updated_instance.completed_at.is_none() {
            updated_instance.completed_at = Some(chrono::Utc::now());
        }

        let history = NewHistoryEntry {
            instance_id: instance_id.to_string(),
            step_name: assumed_step_name.to_string(),
            user_report: report,
            outcome_status: "RESUMING".to_string(),
            determined_next_step: Some(decision.next_step_name.clone()),
        };

        self.persistence.commit_transition(history, &updated_instance).await?;

        warn!(instance_id, assumed_step_name, persisted_step = ?state.current_step_name, "resumed with reconciliation");

        let next_step = self.build_next_step(&state.workflow_name, &decision.next_step_name, new_status).await?;
        Ok(TransitionResult { instance_id: instance_id.to_string(), next_step, current_context: new_context })
    }

    async fn build_next_step(&self, workflow_name: &str, step_name: &str, status: WorkflowStatus) -> Result<NextStep> {
        if status == WorkflowStatus::Completed || step_name == FINISH {
            return Ok(NextStep { step_name: step_name.to_string(), instructions: COMPLETION_MESSAGE.to_string() });
        }
        let instructions = self.definitions.get_step_client_instructions(workflow_name, step_name).await?;
        Ok(NextStep { step_name: step_name.to_string(), instructions })
    }

    /// Canonical response for a transition call on an already-terminal
    /// instance (§4.3.2 step 2, §9 resolved Open Question): no history or
    /// instance mutation, just a silent echo of the current state. A `FAILED`
    /// instance still owes the client the last real step's instructions, not
    /// the completion message, since nothing finished (§4.3.2).
    async fn terminal_result(&self, state: &WorkflowInstance) -> Result<TransitionResult> {
        let step_name = state.current_step_name.clone().unwrap_or_else(|| FINISH.to_string());
        let next_step = if state.status == WorkflowStatus::Failed {
            let instructions = self.definitions.get_step_client_instructions(&state.workflow_name, &step_name).await?;
            NextStep { step_name, instructions }
        } else {
            NextStep { step_name, instructions: COMPLETION_MESSAGE.to_string() }
        };
        Ok(TransitionResult { instance_id: state.instance_id.clone(), next_step, current_context: state.context.clone() })
    }

    /// Best-effort marks `state` as `FAILED` when `result` carries a
    /// Definition Service error, then re-raises it unchanged (§7: DS errors
    /// on `advance`/`resume` set instance status to `FAILED` if possible).
    async fn mark_failed_on_definition_error<T>(&self, state: &WorkflowInstance, result: std::result::Result<T, stepwise_definitions::DefinitionError>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let mut failed_instance = state.clone();
                failed_instance.status = WorkflowStatus::Failed;
                if let Err(persist_err) = self.persistence.update_instance(&failed_instance).await {
                    warn!(instance_id = %state.instance_id, error = %persist_err, "failed to persist FAILED status after definition error");
                }
                Err(err.into())
            }
        }
    }
}

fn derive_status(next_step_name: &str, status_suggestion: Option<&str>, fallback: WorkflowStatus) -> WorkflowStatus {
    if next_step_name == FINISH {
        return WorkflowStatus::Completed;
    }
    if let Some(suggestion) = status_suggestion {
        if let Ok(parsed) = suggestion.parse::<WorkflowStatus>() {
            return parsed;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepwise_ai::StubAiClient;
    use stepwise_definitions::MarkdownDefinitionService;
    use stepwise_state::SqliteStore;
    use tempfile::tempdir;

    fn write_workflow(base: &std::path::Path, name: &str) {
        let dir = base.join(name);
        let steps_dir = dir.join("steps");
        std::fs::create_dir_all(&steps_dir).unwrap();
        std::fs::write(dir.join("index.md"), "- [greet](steps/greet.md)\n- [farewell](steps/farewell.md)\n").unwrap();
        std::fs::write(
            steps_dir.join("greet.md"),
            "# Orchestrator Guidance\nGreet warmly.\n\n# Client Instructions\nSay hello.\n",
        )
        .unwrap();
        std::fs::write(
            steps_dir.join("farewell.md"),
            "# Orchestrator Guidance\nSay goodbye.\n\n# Client Instructions\nSay bye.\n",
        )
        .unwrap();
    }

    async fn build_engine(dir: &std::path::Path, ai: StubAiClient) -> Engine {
        write_workflow(dir, "GREET");
        let definitions: Arc<dyn DefinitionService> = Arc::new(MarkdownDefinitionService::new(dir));
        let persistence: Arc<dyn PersistenceRepository> = Arc::new(SqliteStore::in_memory().await.unwrap());
        Engine::new(definitions, persistence, Arc::new(ai), 5)
    }

    #[tokio::test]
    async fn start_creates_instance_and_returns_first_step() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: "greet".to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        let engine = build_engine(dir.path(), ai).await;

        let result = engine.start("GREET", None).await.unwrap();
        assert_eq!(result.next_step.step_name, "greet");
        assert_eq!(result.next_step.instructions, "Say hello.");
    }

    #[tokio::test]
    async fn advance_moves_to_next_step_and_records_history() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: "greet".to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        ai.script_next(
            "greet",
            stepwise_ai::AiDecision {
                next_step_name: "farewell".to_string(),
                updated_context: vec![],
                status_suggestion: None,
                reasoning: None,
            },
        );
        let engine = build_engine(dir.path(), ai).await;

        let started = engine.start("GREET", None).await.unwrap();
        let advanced = engine.advance(&started.instance_id, json!({"status": "success"}), None).await.unwrap();
        assert_eq!(advanced.next_step.step_name, "farewell");
    }

    #[tokio::test]
    async fn advance_to_finish_completes_instance() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: "greet".to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        ai.script_next(
            "greet",
            stepwise_ai::AiDecision {
                next_step_name: stepwise_ai::FINISH.to_string(),
                updated_context: vec![],
                status_suggestion: None,
                reasoning: None,
            },
        );
        let engine = build_engine(dir.path(), ai).await;

        let started = engine.start("GREET", None).await.unwrap();
        let advanced = engine.advance(&started.instance_id, json!({"status": "success"}), None).await.unwrap();
        assert_eq!(advanced.next_step.step_name, stepwise_ai::FINISH);
        assert_eq!(advanced.next_step.instructions, COMPLETION_MESSAGE);
    }

    #[tokio::test]
    async fn advance_on_terminal_instance_is_a_silent_no_op() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: stepwise_ai::FINISH.to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        let engine = build_engine(dir.path(), ai).await;

        let started = engine.start("GREET", None).await.unwrap();
        let second = engine.advance(&started.instance_id, json!({"status": "success"}), None).await.unwrap();
        assert_eq!(second.next_step.step_name, stepwise_ai::FINISH);
    }

    #[tokio::test]
    async fn resume_reconciles_assumed_step() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: "greet".to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        ai.script_reconcile(
            "greet",
            stepwise_ai::AiDecision {
                next_step_name: "farewell".to_string(),
                updated_context: vec![],
                status_suggestion: None,
                reasoning: None,
            },
        );
        let engine = build_engine(dir.path(), ai).await;

        let started = engine.start("GREET", None).await.unwrap();
        let resumed = engine.resume(&started.instance_id, "greet", json!({"status": "RESUMING"}), None).await.unwrap();
        assert_eq!(resumed.next_step.step_name, "farewell");
    }

    #[tokio::test]
    async fn client_context_updates_merge_beneath_ai_updates() {
        let dir = tempdir().unwrap();
        let ai = StubAiClient::new();
        ai.script_first(stepwise_ai::AiDecision {
            next_step_name: "greet".to_string(),
            updated_context: vec![],
            status_suggestion: None,
            reasoning: None,
        });
        ai.script_next(
            "greet",
            stepwise_ai::AiDecision {
                next_step_name: "farewell".to_string(),
                updated_context: vec![stepwise_ai::ContextUpdate { key: "name".to_string(), value: json!("overridden") }],
                status_suggestion: None,
                reasoning: None,
            },
        );
        let engine = build_engine(dir.path(), ai).await;

        let started = engine.start("GREET", None).await.unwrap();
        let advanced = engine
            .advance(&started.instance_id, json!({"status": "success"}), Some(json!({"name": "client-value"})))
            .await
            .unwrap();
        assert_eq!(advanced.current_context["name"], json!("overridden"));
    }
}
