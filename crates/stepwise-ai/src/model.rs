// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Value types exchanged across the AI client boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The client's structured feedback about the outcome of the previously
/// issued step. Shape is deliberately loose: only `status` is ever read by
/// the engine, the rest is opaque payload forwarded to the model verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Outcome as reported by the client, e.g. "success", "failure", "resuming".
    #[serde(default = "Report::default_status")]
    pub status: String,
    /// Free-form structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Free-form human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description, if the report concerns a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    fn default_status() -> String {
        "unknown".to_string()
    }
}

/// One `{key, value}` pair in an `updated_context` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub key: String,
    pub value: Value,
}

/// The model's structured answer to one of the three AIC intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    /// `FINISH` or a canonical step ID of the workflow being executed.
    pub next_step_name: String,
    /// Context mutations the model wants applied on top of the working context.
    #[serde(default)]
    pub updated_context: Vec<ContextUpdate>,
    /// Optional status override, validated against the status enum by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_suggestion: Option<String>,
    /// Optional free-text rationale, carried for audit/debugging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Which of the three intents a prompt is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// `determine_first_step`
    First,
    /// `determine_next_step`
    Next,
    /// `reconcile_and_determine_next_step`
    Reconcile,
}

impl Intent {
    /// The task line appended to the prompt, specialized per intent (§4.4 step 7).
    pub fn task_line(self) -> &'static str {
        match self {
            Intent::First => "Determine the very first step of this workflow.",
            Intent::Next => "Determine the next step given the report below.",
            Intent::Reconcile => {
                "Reconcile the user's assumed state with the persisted state and determine the next step."
            }
        }
    }
}
