// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic stub [`AiClient`], substituted in when `USE_STUB_AI_CLIENT=true`
//! (§6) and used as the fixture for engine-level scenario tests (§8).

use crate::error::{AiClientError, AiClientResult};
use crate::model::AiDecision;
use crate::traits::{validate_next_step_name, validate_status_suggestion, AiClient, HistoryView, InstanceView};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Which call a scripted response or failure is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScriptKey {
    First,
    Next(String),
    Reconcile(String),
}

/// A scripted outcome: either a decision to return, or an error to return
/// once (used to script the "times out once then succeeds" scenario, §8.6).
enum Scripted {
    Decision(AiDecision),
    Fail(fn() -> AiClientError),
}

/// Stub AI client returning pre-scripted [`AiDecision`] values keyed on
/// intent and the current/assumed step name.
///
/// The engine cannot tell this apart from a real transport; it only sees the
/// `AiClient` trait.
pub struct StubAiClient {
    scripts: Mutex<HashMap<ScriptKey, VecDeque<Scripted>>>,
}

impl StubAiClient {
    pub fn new() -> Self {
        Self { scripts: Mutex::new(HashMap::new()) }
    }

    fn push(&self, key: ScriptKey, item: Scripted) {
        self.scripts.lock().unwrap().entry(key).or_default().push_back(item);
    }

    /// Script the decision returned by `determine_first_step`.
    pub fn script_first(&self, decision: AiDecision) -> &Self {
        self.push(ScriptKey::First, Scripted::Decision(decision));
        self
    }

    /// Script the decision returned by `determine_next_step` when the
    /// instance's current step is `current_step`.
    pub fn script_next(&self, current_step: impl Into<String>, decision: AiDecision) -> &Self {
        self.push(ScriptKey::Next(current_step.into()), Scripted::Decision(decision));
        self
    }

    /// Script the decision returned by `reconcile_and_determine_next_step`
    /// when the client's assumed step is `assumed_step`.
    pub fn script_reconcile(&self, assumed_step: impl Into<String>, decision: AiDecision) -> &Self {
        self.push(ScriptKey::Reconcile(assumed_step.into()), Scripted::Decision(decision));
        self
    }

    /// Script a one-time timeout for the next `determine_next_step` call on
    /// `current_step`, to exercise the wire-level retry semantics end to end.
    pub fn script_next_timeout_once(&self, current_step: impl Into<String>) -> &Self {
        self.push(
            ScriptKey::Next(current_step.into()),
            Scripted::Fail(|| AiClientError::Timeout(std::time::Duration::from_secs(1))),
        );
        self
    }

    fn pop(&self, key: &ScriptKey) -> Option<Scripted> {
        self.scripts.lock().unwrap().get_mut(key).and_then(|q| q.pop_front())
    }

    fn resolve(&self, key: ScriptKey, known_steps: &[String]) -> AiClientResult<AiDecision> {
        match self.pop(&key) {
            Some(Scripted::Decision(decision)) => {
                validate_next_step_name(&decision.next_step_name, known_steps)?;
                validate_status_suggestion(&decision.status_suggestion)?;
                Ok(decision)
            }
            Some(Scripted::Fail(make_err)) => Err(make_err()),
            None => Err(AiClientError::Configuration(format!(
                "no scripted AiDecision for {key:?}; call script_first/script_next/script_reconcile before invoking the stub"
            ))),
        }
    }
}

impl Default for StubAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiClient for StubAiClient {
    async fn determine_first_step(
        &self,
        _workflow_name: &str,
        _full_blob: &str,
        known_steps: &[String],
    ) -> AiClientResult<AiDecision> {
        match self.resolve(ScriptKey::First, known_steps) {
            Err(err) if err.is_retryable() => self.resolve(ScriptKey::First, known_steps),
            other => other,
        }
    }

    async fn determine_next_step(
        &self,
        _workflow_name: &str,
        _full_blob: &str,
        known_steps: &[String],
        instance: InstanceView<'_>,
        _report: &crate::model::Report,
        _recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision> {
        let key = ScriptKey::Next(instance.current_step_name.unwrap_or("").to_string());
        match self.resolve(key.clone(), known_steps) {
            Err(err) if err.is_retryable() => self.resolve(key, known_steps),
            other => other,
        }
    }

    async fn reconcile_and_determine_next_step(
        &self,
        _workflow_name: &str,
        _full_blob: &str,
        known_steps: &[String],
        _instance: InstanceView<'_>,
        assumed_current_step_name: &str,
        _report: &crate::model::Report,
        _recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision> {
        let key = ScriptKey::Reconcile(assumed_current_step_name.to_string());
        match self.resolve(key.clone(), known_steps) {
            Err(err) if err.is_retryable() => self.resolve(key, known_steps),
            other => other,
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
