// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed implementation of the `PersistenceRepository` trait.

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{HistoryEntry, NewHistoryEntry, WorkflowInstance, WorkflowStatus};
use crate::traits::PersistenceRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Single-file SQLite store for instances and history (§4.2, §6).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the store file at `database_path` and run
    /// embedded migrations. `max_connections` defaults to 5 if `None`.
    pub async fn new(database_path: impl AsRef<str>, max_connections: Option<u32>) -> PersistenceResult<Self> {
        let max_conn = max_connections.unwrap_or(5);

        info!(path = database_path.as_ref(), max_connections = max_conn, "opening SQLite store");

        let connect_opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path.as_ref()))
            .map_err(|e| PersistenceError::Connection(format!("invalid database path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_conn)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_opts)
            .await
            .map_err(|e| PersistenceError::Connection(format!("failed to open pool: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Construct an in-memory store, used by engine-level scenario tests.
    pub async fn in_memory() -> PersistenceResult<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| PersistenceError::Connection(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> PersistenceResult<()> {
        debug!("running persistence migrations");
        let migration_001 = include_str!("../migrations/001_initial_schema.sql");
        sqlx::query(migration_001)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(format!("migration 001 failed: {e}")))?;
        Ok(())
    }

    fn row_to_instance(row: &sqlx::sqlite::SqliteRow) -> PersistenceResult<WorkflowInstance> {
        let status_str: String = row.try_get("status")?;
        let status = WorkflowStatus::from_str(&status_str).map_err(PersistenceError::Query)?;
        let context_str: String = row.try_get("context")?;
        let context: Value = serde_json::from_str(&context_str)?;

        Ok(WorkflowInstance {
            instance_id: row.try_get("instance_id")?,
            workflow_name: row.try_get("workflow_name")?,
            current_step_name: row.try_get("current_step_name")?,
            status,
            context,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> PersistenceResult<HistoryEntry> {
        let user_report_str: String = row.try_get("user_report")?;
        Ok(HistoryEntry {
            history_id: row.try_get("history_id")?,
            instance_id: row.try_get("instance_id")?,
            timestamp: row.try_get("timestamp")?,
            step_name: row.try_get("step_name")?,
            user_report: serde_json::from_str(&user_report_str)?,
            outcome_status: row.try_get("outcome_status")?,
            determined_next_step: row.try_get("determined_next_step")?,
        })
    }
}

#[async_trait]
impl PersistenceRepository for SqliteStore {
    async fn create_instance(&self, instance: &WorkflowInstance) -> PersistenceResult<()> {
        debug!(instance_id = %instance.instance_id, "creating instance");
        let context_json = serde_json::to_string(&instance.context)?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT instance_id FROM instances WHERE instance_id = ?1")
            .bind(&instance.instance_id)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(PersistenceError::AlreadyExists(instance.instance_id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO instances (
                instance_id, workflow_name, current_step_name, status,
                context, created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&instance.instance_id)
        .bind(&instance.workflow_name)
        .bind(&instance.current_step_name)
        .bind(instance.status.to_string())
        .bind(context_json)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(instance.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> PersistenceResult<WorkflowInstance> {
        let row = sqlx::query(
            r#"
            SELECT instance_id, workflow_name, current_step_name, status,
                   context, created_at, updated_at, completed_at
            FROM instances WHERE instance_id = ?1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PersistenceError::InstanceNotFound(instance_id.to_string()))?;

        Self::row_to_instance(&row)
    }

    async fn update_instance(&self, instance: &WorkflowInstance) -> PersistenceResult<()> {
        let context_json = serde_json::to_string(&instance.context)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE instances SET
                current_step_name = ?1,
                status = ?2,
                context = ?3,
                updated_at = ?4,
                completed_at = COALESCE(completed_at, ?5)
            WHERE instance_id = ?6
            "#,
        )
        .bind(&instance.current_step_name)
        .bind(instance.status.to_string())
        .bind(context_json)
        .bind(now)
        .bind(instance.completed_at)
        .bind(&instance.instance_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::InstanceNotFound(instance.instance_id.clone()));
        }
        Ok(())
    }

    async fn get_history(&self, instance_id: &str, limit: Option<u32>) -> PersistenceResult<Vec<HistoryEntry>> {
        let limit = limit.unwrap_or(u32::MAX) as i64;
        let rows = sqlx::query(
            r#"
            SELECT history_id, instance_id, timestamp, step_name,
                   user_report, outcome_status, determined_next_step
            FROM history
            WHERE instance_id = ?1
            ORDER BY history_id DESC
            LIMIT ?2
            "#,
        )
        .bind(instance_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_history).collect()
    }

    async fn commit_transition(
        &self,
        history: NewHistoryEntry,
        updated_instance: &WorkflowInstance,
    ) -> PersistenceResult<HistoryEntry> {
        debug!(instance_id = %updated_instance.instance_id, "committing transition");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let user_report_json = serde_json::to_string(&history.user_report)?;

        let insert_result = sqlx::query(
            r#"
            INSERT INTO history (instance_id, timestamp, step_name, user_report, outcome_status, determined_next_step)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&history.instance_id)
        .bind(now)
        .bind(&history.step_name)
        .bind(user_report_json)
        .bind(&history.outcome_status)
        .bind(&history.determined_next_step)
        .execute(&mut *tx)
        .await?;

        let history_id = insert_result.last_insert_rowid();

        let context_json = serde_json::to_string(&updated_instance.context)?;
        let result = sqlx::query(
            r#"
            UPDATE instances SET
                current_step_name = ?1,
                status = ?2,
                context = ?3,
                updated_at = ?4,
                completed_at = COALESCE(completed_at, ?5)
            WHERE instance_id = ?6
            "#,
        )
        .bind(&updated_instance.current_step_name)
        .bind(updated_instance.status.to_string())
        .bind(context_json)
        .bind(now)
        .bind(updated_instance.completed_at)
        .bind(&updated_instance.instance_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::InstanceNotFound(updated_instance.instance_id.clone()));
        }

        tx.commit().await?;

        Ok(HistoryEntry {
            history_id,
            instance_id: history.instance_id,
            timestamp: now,
            step_name: history.step_name,
            user_report: history.user_report,
            outcome_status: history.outcome_status,
            determined_next_step: history.determined_next_step,
        })
    }

    async fn health_check(&self) -> PersistenceResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::Connection(format!("health check failed: {e}")))?;
        Ok(())
    }
}
