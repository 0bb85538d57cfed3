// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for engine transitions and AI calls (§10.5).

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder};

lazy_static! {
    /// Total transitions by kind (start/advance/resume) and outcome.
    pub static ref TRANSITIONS_TOTAL: CounterVec = register_counter_vec!(
        "stepwise_transitions_total",
        "Total engine transitions by kind and outcome",
        &["transition", "outcome"]
    )
    .expect("failed to register stepwise_transitions_total");

    /// Transition duration in seconds.
    pub static ref TRANSITION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "stepwise_transition_duration_seconds",
        "Engine transition duration in seconds",
        &["transition"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("failed to register stepwise_transition_duration_seconds");

    /// Total AI client calls by intent and outcome.
    pub static ref AI_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "stepwise_ai_calls_total",
        "Total AI client calls by intent and outcome",
        &["intent", "outcome"]
    )
    .expect("failed to register stepwise_ai_calls_total");
}

/// Records a completed transition.
#[inline]
pub fn record_transition(transition: &str, duration_seconds: f64, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    TRANSITIONS_TOTAL.with_label_values(&[transition, outcome]).inc();
    TRANSITION_DURATION_SECONDS.with_label_values(&[transition]).observe(duration_seconds);
}

/// Records one AI client call.
#[inline]
pub fn record_ai_call(intent: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    AI_CALLS_TOTAL.with_label_values(&[intent, outcome]).inc();
}

/// Gathers and encodes all metrics in Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).expect("metrics encoding should not fail");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_transition_updates_counter_and_histogram() {
        record_transition("advance", 0.2, true);
        let count = TRANSITIONS_TOTAL.with_label_values(&["advance", "success"]).get();
        assert!(count >= 1.0);
    }

    #[test]
    fn record_ai_call_distinguishes_outcome() {
        record_ai_call("next", false);
        let count = AI_CALLS_TOTAL.with_label_values(&["next", "failure"]).get();
        assert!(count >= 1.0);
    }

    #[test]
    fn gather_metrics_includes_registered_families() {
        record_transition("start", 0.1, true);
        let text = gather_metrics();
        assert!(text.contains("stepwise_transitions_total"));
    }
}
