// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Public request/response shapes for the three engine transitions (§4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical completion message returned instead of client instructions once
/// an instance reaches `FINISH` (§4.3.1).
pub const COMPLETION_MESSAGE: &str = "Workflow Completed.";

/// The step the caller should act on next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStep {
    pub step_name: String,
    pub instructions: String,
}

/// The uniform return shape for `start`, `advance`, and `resume` (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub instance_id: String,
    pub next_step: NextStep,
    pub current_context: Value,
}

/// Extracts the `status` field from an opaque client report, defaulting to
/// `"unknown"` when absent (§4.3.2 step 4).
pub fn report_status(report: &Value) -> String {
    report.get("status").and_then(Value::as_str).unwrap_or("unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_status_reads_string_field() {
        assert_eq!(report_status(&json!({"status": "success"})), "success");
    }

    #[test]
    fn report_status_defaults_to_unknown() {
        assert_eq!(report_status(&json!({"detail": "no status here"})), "unknown");
        assert_eq!(report_status(&json!(null)), "unknown");
    }
}
