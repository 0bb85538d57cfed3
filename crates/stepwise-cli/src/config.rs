// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven configuration, loaded once at startup (§10.3).

use anyhow::{Context, Result};

/// Default count of recent history entries fed back to the AI client on
/// `advance`/`resume` (§4.3.2) when `HISTORY_LIMIT` is unset.
const DEFAULT_HISTORY_LIMIT: u32 = 5;

/// Default ceiling on `{{file:...}}` include recursion (§4.1) when
/// `INCLUDE_DEPTH_LIMIT` is unset.
const DEFAULT_INCLUDE_DEPTH_LIMIT: u32 = 10;

/// Default Gemini model name when `GEMINI_MODEL_NAME` is unset.
const DEFAULT_GEMINI_MODEL_NAME: &str = "gemini-1.5-flash";

/// Default Gemini request timeout, in seconds, when
/// `GEMINI_REQUEST_TIMEOUT_SECONDS` is unset.
const DEFAULT_GEMINI_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Immutable process configuration assembled from the environment (§10.3):
/// read once at startup, then threaded explicitly into every component that
/// needs a setting, rather than re-read from `std::env` deeper in the stack.
pub struct Config {
    pub workflow_definitions_dir: String,
    pub workflow_db_path: String,
    pub use_stub_ai_client: bool,
    pub log_level: String,
    pub orchestrator_log_dir: Option<String>,
    pub orchestrator_log_file: Option<String>,
    pub ai_interactions_log_file: Option<String>,
    pub history_limit: u32,
    pub include_depth_limit: u32,
    pub gemini_api_key: Option<String>,
    pub gemini_model_name: String,
    pub gemini_request_timeout_seconds: u64,
}

impl Config {
    /// Load `.env` (if present, silently ignored otherwise) then read
    /// required and optional environment variables.
    pub fn load() -> Result<Self> {
        // Absence of a `.env` file is expected in production; only a
        // malformed file that exists is worth failing fast on.
        if std::path::Path::new(".env").exists() {
            dotenvy::dotenv().context("failed to parse .env file")?;
        }

        let workflow_definitions_dir = std::env::var("WORKFLOW_DEFINITIONS_DIR")
            .context("WORKFLOW_DEFINITIONS_DIR must be set (directory containing workflow subdirectories)")?;
        let workflow_db_path = std::env::var("WORKFLOW_DB_PATH")
            .context("WORKFLOW_DB_PATH must be set (path to the SQLite state database)")?;

        let use_stub_ai_client = std::env::var("USE_STUB_AI_CLIENT")
            .ok()
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let history_limit = parse_env_or_default("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?;
        let include_depth_limit = parse_env_or_default("INCLUDE_DEPTH_LIMIT", DEFAULT_INCLUDE_DEPTH_LIMIT)?;
        let gemini_request_timeout_seconds =
            parse_env_or_default("GEMINI_REQUEST_TIMEOUT_SECONDS", DEFAULT_GEMINI_REQUEST_TIMEOUT_SECONDS)?;

        Ok(Self {
            workflow_definitions_dir,
            workflow_db_path,
            use_stub_ai_client,
            log_level,
            orchestrator_log_dir: std::env::var("ORCHESTRATOR_LOG_DIR").ok(),
            orchestrator_log_file: std::env::var("ORCHESTRATOR_LOG_FILE").ok(),
            ai_interactions_log_file: std::env::var("AI_INTERACTIONS_LOG_FILE").ok(),
            history_limit,
            include_depth_limit,
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gemini_model_name: std::env::var("GEMINI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL_NAME.to_string()),
            gemini_request_timeout_seconds,
        })
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|e| anyhow::anyhow!("{key} is not a valid value: {e}")),
        Err(_) => Ok(default),
    }
}
