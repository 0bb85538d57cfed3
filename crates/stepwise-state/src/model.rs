// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Data models for the two durable relations: instances and history (§3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Reserved `current_step_name` value denoting workflow completion.
pub const FINISH: &str = "FINISH";

/// Workflow instance execution status (§3).
///
/// Stored as plain `TEXT` in SQLite (via `Display`/`FromStr`) rather than a
/// `sqlx::Type` derive — SQLite has no native enum type, so the store binds
/// and reads this as a string column directly (see `sqlite.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Suspended => "SUSPENDED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "SUSPENDED" => Ok(Self::Suspended),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("invalid workflow status: {other}")),
        }
    }
}

impl WorkflowStatus {
    /// Terminal statuses accept no further mutating transitions (§4.3, §9).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The mutable per-instance record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub instance_id: String,
    pub workflow_name: String,
    /// `None` pre-start; may be the `FINISH` sentinel once completed.
    pub current_step_name: Option<String>,
    pub status: WorkflowStatus,
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Construct a fresh instance as produced by `start` (§4.3.1).
    pub fn new(workflow_name: impl Into<String>, current_step_name: Option<String>, status: WorkflowStatus, context: Value) -> Self {
        let now = Utc::now();
        let completed_at = if status == WorkflowStatus::Completed { Some(now) } else { None };
        Self {
            instance_id: Uuid::new_v4().to_string(),
            workflow_name: workflow_name.into(),
            current_step_name,
            status,
            context,
            created_at: now,
            updated_at: now,
            completed_at,
        }
    }

    /// Invariant check (§3): `status = COMPLETED` iff `completed_at` set and
    /// `current_step_name = FINISH`.
    pub fn completion_invariant_holds(&self) -> bool {
        let completed = self.status == WorkflowStatus::Completed;
        let has_completed_at = self.completed_at.is_some();
        let step_is_finish = self.current_step_name.as_deref() == Some(FINISH);
        completed == (has_completed_at && step_is_finish)
    }
}

/// Append-only event log entry (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonically increasing, assigned by the store.
    pub history_id: i64,
    pub instance_id: String,
    pub timestamp: DateTime<Utc>,
    /// The step being reported on, or the assumed step on resume.
    pub step_name: String,
    pub user_report: Value,
    pub outcome_status: String,
    pub determined_next_step: Option<String>,
}

/// A history entry not yet assigned a `history_id` or `timestamp` by the store.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub instance_id: String,
    pub step_name: String,
    pub user_report: Value,
    pub outcome_status: String,
    pub determined_next_step: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_roundtrips_through_display_and_fromstr() {
        for status in [WorkflowStatus::Running, WorkflowStatus::Suspended, WorkflowStatus::Completed, WorkflowStatus::Failed] {
            let s = status.to_string();
            assert_eq!(s.parse::<WorkflowStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(!WorkflowStatus::Suspended.is_terminal());
    }

    #[test]
    fn new_instance_satisfies_completion_invariant() {
        let instance = WorkflowInstance::new("GREET", Some("greet".to_string()), WorkflowStatus::Running, json!({}));
        assert!(instance.completion_invariant_holds());
        assert!(instance.completed_at.is_none());
    }

    #[test]
    fn completed_instance_satisfies_completion_invariant() {
        let instance = WorkflowInstance::new("GREET", Some(FINISH.to_string()), WorkflowStatus::Completed, json!({}));
        assert!(instance.completion_invariant_holds());
        assert!(instance.completed_at.is_some());
    }

    #[test]
    fn mismatched_completion_violates_invariant() {
        let mut instance = WorkflowInstance::new("GREET", Some("greet".to_string()), WorkflowStatus::Running, json!({}));
        instance.status = WorkflowStatus::Completed;
        assert!(!instance.completion_invariant_holds());
    }
}
