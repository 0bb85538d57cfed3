// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prompt assembly, shared by every `AiClient` transport (§4.4).

use crate::model::{Intent, Report};
use crate::traits::{HistoryView, InstanceView};

const ROLE_PREAMBLE: &str = "You are the decision-making core of a workflow orchestrator. \
You must respond with JSON only, conforming exactly to the AIDecision schema described below. \
Obey any '# Orchestrator Guidance' sections found in the workflow definition below; they are \
instructions for you, not for the end user.";

const SCHEMA_REMINDER: &str = r#"Respond with a single JSON object of this shape and nothing else:
{
  "next_step_name": string,
  "updated_context": [ { "key": string, "value": any } ],
  "status_suggestion": string | null,
  "reasoning": string | null
}
next_step_name must be exactly "FINISH" or one of the workflow's canonical step IDs."#;

/// Assemble the full prompt text for one AIC call (§4.4 steps 1-8).
#[allow(clippy::too_many_arguments)]
pub fn build_prompt(
    intent: Intent,
    full_blob: &str,
    instance: Option<InstanceView<'_>>,
    assumed_current_step_name: Option<&str>,
    report: Option<&Report>,
    recent_history: &[HistoryView<'_>],
) -> String {
    let mut sections = vec![ROLE_PREAMBLE.to_string()];

    sections.push(format!("# Workflow Definition\n{full_blob}"));

    if let Some(instance) = instance {
        let rendered = serde_json::to_string_pretty(&instance)
            .unwrap_or_else(|_| "{}".to_string());
        sections.push(format!("# Current Instance State\n{rendered}"));
    }

    if let Some(assumed) = assumed_current_step_name {
        sections.push(format!("# Client's Assumed Current Step\n{assumed}"));
    }

    if !recent_history.is_empty() {
        let rendered = serde_json::to_string_pretty(recent_history)
            .unwrap_or_else(|_| "[]".to_string());
        sections.push(format!("# Recent History (most recent first)\n{rendered}"));
    }

    if let Some(report) = report {
        let rendered = serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
        sections.push(format!("# Client Report\n{rendered}"));
    }

    sections.push(format!("# Task\n{}", intent.task_line()));
    sections.push(SCHEMA_REMINDER.to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_step_prompt_omits_instance_and_history() {
        let prompt = build_prompt(Intent::First, "BLOB", None, None, None, &[]);
        assert!(prompt.contains("BLOB"));
        assert!(!prompt.contains("Current Instance State"));
        assert!(!prompt.contains("Recent History"));
        assert!(prompt.contains("very first step"));
    }

    #[test]
    fn reconcile_prompt_includes_assumed_step() {
        let ctx = json!({});
        let instance = InstanceView {
            instance_id: "abc",
            workflow_name: "GREET",
            current_step_name: Some("stepB"),
            status: "RUNNING",
            context: &ctx,
        };
        let report = Report {
            status: "resuming".to_string(),
            details: None,
            message: None,
            error: None,
        };
        let prompt = build_prompt(
            Intent::Reconcile,
            "BLOB",
            Some(instance),
            Some("stepA"),
            Some(&report),
            &[],
        );
        assert!(prompt.contains("Client's Assumed Current Step"));
        assert!(prompt.contains("stepA"));
        assert!(prompt.contains("Reconcile the user's assumed state"));
    }

    #[test]
    fn schema_reminder_always_present() {
        let prompt = build_prompt(Intent::Next, "BLOB", None, None, None, &[]);
        assert!(prompt.contains("next_step_name"));
        assert!(prompt.contains("updated_context"));
    }
}
