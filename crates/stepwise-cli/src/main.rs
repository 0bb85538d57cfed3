// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stepwise Orchestrator CLI — thin adapter exposing the five engine tools
//! as subcommands over stdout (§6).

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stepwise_ai::{AiClient, GeminiClient, StubAiClient};
use stepwise_core::{Engine, OrchestratorError};
use stepwise_definitions::{DefinitionService, MarkdownDefinitionService};
use stepwise_state::{PersistenceRepository, SqliteStore};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(version, about = "Stepwise AI-guided workflow orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered workflow names.
    ListWorkflows,

    /// Start a new instance of a workflow.
    StartWorkflow {
        workflow_name: String,
        /// Initial context as a JSON object, or a path to a JSON file.
        #[arg(long)]
        context: Option<String>,
    },

    /// Fetch the full persisted state of an instance.
    GetWorkflowStatus { instance_id: String },

    /// Report an outcome and receive the next step.
    AdvanceWorkflow {
        instance_id: String,
        /// Report as a JSON object, or a path to a JSON file.
        report: String,
        #[arg(long)]
        context_updates: Option<String>,
    },

    /// Reconnect and reconcile an assumed step with the persisted one.
    ResumeWorkflow {
        instance_id: String,
        assumed_current_step_name: String,
        report: String,
        #[arg(long)]
        context_updates: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:?}", "Configuration error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    let _log_guards = init_logging(&config);

    let result = run(cli.command, &config).await;

    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string()));
        }
        Err(e) => {
            error!("{:?}", e);
            let exit_code = exit_code_for(&e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(exit_code);
        }
    }
}

/// Initializes `tracing`, returning guards that must be held for the life of
/// the process so non-blocking file appenders keep flushing (§10.1).
fn init_logging(config: &Config) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    let mut guards = Vec::new();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("stepwise={}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    let file_layer = match (&config.orchestrator_log_dir, &config.orchestrator_log_file) {
        (Some(dir), Some(file)) => {
            let appender = tracing_appender::rolling::never(dir, file);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        _ => None,
    };

    let ai_interactions_layer = config.ai_interactions_log_file.as_ref().map(|file| {
        let appender = tracing_appender::rolling::never(".", file);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::Targets::new().with_target("ai_interactions", tracing::Level::INFO))
    });

    registry.with(file_layer).with(ai_interactions_layer).init();

    guards
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<Value> {
    let engine = build_engine(config).await?;

    let response = match command {
        Commands::ListWorkflows => {
            let definitions: Arc<dyn DefinitionService> = definitions_service(config);
            let workflows = definitions.list_workflows().await?;
            serde_json::json!({ "workflows": workflows })
        }
        Commands::StartWorkflow { workflow_name, context } => {
            let context = context.as_deref().map(parse_json_arg).transpose()?;
            let result = engine.start(&workflow_name, context).await.map_err(map_engine_error)?;
            serde_json::to_value(result)?
        }
        Commands::GetWorkflowStatus { instance_id } => {
            let persistence = persistence_repository(config).await?;
            let instance = persistence.get_instance(&instance_id).await.map_err(OrchestratorError::from).map_err(map_engine_error)?;
            serde_json::to_value(instance)?
        }
        Commands::AdvanceWorkflow { instance_id, report, context_updates } => {
            let report = parse_json_arg(&report)?;
            let context_updates = context_updates.as_deref().map(parse_json_arg).transpose()?;
            let result = engine.advance(&instance_id, report, context_updates).await.map_err(map_engine_error)?;
            serde_json::to_value(result)?
        }
        Commands::ResumeWorkflow { instance_id, assumed_current_step_name, report, context_updates } => {
            let report = parse_json_arg(&report)?;
            let context_updates = context_updates.as_deref().map(parse_json_arg).transpose()?;
            let result = engine
                .resume(&instance_id, &assumed_current_step_name, report, context_updates)
                .await
                .map_err(map_engine_error)?;
            serde_json::to_value(result)?
        }
    };

    Ok(response)
}

fn definitions_service(config: &Config) -> Arc<dyn DefinitionService> {
    Arc::new(MarkdownDefinitionService::new(&config.workflow_definitions_dir).with_include_depth_limit(config.include_depth_limit))
}

async fn persistence_repository(config: &Config) -> Result<Arc<dyn PersistenceRepository>> {
    let store = SqliteStore::new(&config.workflow_db_path, None)
        .await
        .with_context(|| format!("failed to open state database at {}", config.workflow_db_path))?;
    Ok(Arc::new(store))
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let definitions = definitions_service(config);
    let persistence = persistence_repository(config).await?;
    let ai_client: Arc<dyn AiClient> = if config.use_stub_ai_client {
        info!("using stub AI client (USE_STUB_AI_CLIENT=true)");
        Arc::new(StubAiClient::new())
    } else {
        let api_key = config
            .gemini_api_key
            .clone()
            .context("GEMINI_API_KEY must be set unless USE_STUB_AI_CLIENT=true")?;
        Arc::new(
            GeminiClient::new(api_key, config.gemini_model_name.clone(), Duration::from_secs(config.gemini_request_timeout_seconds))
                .context("failed to configure the Gemini AI client")?,
        )
    };
    Ok(Engine::new(definitions, persistence, ai_client, config.history_limit))
}

/// Accepts either a JSON literal or a path to a file containing JSON.
fn parse_json_arg(arg: &str) -> Result<Value> {
    if Path::new(arg).exists() {
        let content = fs::read_to_string(arg).with_context(|| format!("failed to read JSON file: {}", arg))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse JSON from file: {}", arg))
    } else {
        serde_json::from_str(arg).with_context(|| "failed to parse JSON argument")
    }
}

fn map_engine_error(err: OrchestratorError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

/// §7: not-found errors, validation errors, and internal/upstream failures
/// get distinct exit codes so callers can branch on them without parsing text.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<OrchestratorError>() {
        return match e {
            OrchestratorError::InstanceNotFound(_) => 3,
            OrchestratorError::Persistence(stepwise_state::PersistenceError::InstanceNotFound(_)) => 3,
            OrchestratorError::Definition(stepwise_definitions::DefinitionError::NotFound(_)) => 3,
            OrchestratorError::Validation(_) => 4,
            _ => 1,
        };
    }
    1
}
