// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gemini-backed implementation of [`AiClient`], the pluggable transport
//! anticipated by §4.4.

use crate::error::{AiClientError, AiClientResult};
use crate::model::{AiDecision, Intent, Report};
use crate::prompt::build_prompt;
use crate::retry::with_one_retry;
use crate::traits::{validate_next_step_name, validate_status_suggestion, AiClient, HistoryView, InstanceView};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client from explicit settings.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> AiClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AiClientError::Transport)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            timeout,
        })
    }

    /// Override the API base URL (used by tests against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn call_model(&self, prompt: String) -> AiClientResult<AiDecision> {
        with_one_retry("gemini.generate_content", || self.call_model_once(prompt.clone())).await
    }

    async fn call_model_once(&self, prompt: String) -> AiClientResult<AiDecision> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        tracing::info!(target: "ai_interactions", model = %self.model, prompt = %request_body.contents[0].parts[0].text, "sending prompt to Gemini");

        let response = self
            .http
            .post(self.endpoint())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiClientError::Timeout(self.timeout)
                } else {
                    AiClientError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 408 || status.as_u16() == 504 {
                return Err(AiClientError::Timeout(self.timeout));
            }
            return Err(AiClientError::ApiError { status: status.as_u16(), body });
        }

        let body: GenerateContentResponse = response.json().await.map_err(AiClientError::Transport)?;

        if let Some(feedback) = &body.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(AiClientError::Safety(reason.clone()));
            }
        }

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| AiClientError::InvalidResponse("no candidates returned".to_string()))?;

        debug!(response_text = %text, "received Gemini response");
        tracing::info!(target: "ai_interactions", model = %self.model, response = %text, "received response from Gemini");

        let decision: AiDecision = serde_json::from_str(&text)
            .map_err(|e| AiClientError::InvalidResponse(format!("response was not valid AIDecision JSON: {e}")))?;

        Ok(decision)
    }

    async fn decide(&self, intent: Intent, prompt: String, known_steps: &[String]) -> AiClientResult<AiDecision> {
        let decision = self.call_model(prompt).await?;
        validate_next_step_name(&decision.next_step_name, known_steps)?;
        validate_status_suggestion(&decision.status_suggestion)?;
        let _ = intent;
        Ok(decision)
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn determine_first_step(
        &self,
        _workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
    ) -> AiClientResult<AiDecision> {
        let prompt = build_prompt(Intent::First, full_blob, None, None, None, &[]);
        self.decide(Intent::First, prompt, known_steps).await
    }

    async fn determine_next_step(
        &self,
        _workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
        instance: InstanceView<'_>,
        report: &Report,
        recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision> {
        let prompt = build_prompt(Intent::Next, full_blob, Some(instance), None, Some(report), recent_history);
        self.decide(Intent::Next, prompt, known_steps).await
    }

    async fn reconcile_and_determine_next_step(
        &self,
        _workflow_name: &str,
        full_blob: &str,
        known_steps: &[String],
        instance: InstanceView<'_>,
        assumed_current_step_name: &str,
        report: &Report,
        recent_history: &[HistoryView<'_>],
    ) -> AiClientResult<AiDecision> {
        let prompt = build_prompt(
            Intent::Reconcile,
            full_blob,
            Some(instance),
            Some(assumed_current_step_name),
            Some(report),
            recent_history,
        );
        self.decide(Intent::Reconcile, prompt, known_steps).await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    async fn health_check(&self) -> AiClientResult<()> {
        if self.api_key.is_empty() {
            return Err(AiClientError::Configuration("empty API key".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "response_mime_type")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}
