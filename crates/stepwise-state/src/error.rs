// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the Persistence Repository (§4.2, §7).

use thiserror::Error;

/// Errors surfaced by a [`crate::PersistenceRepository`] implementation.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No instance exists with the requested ID.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// The store could not be reached at all (pool exhaustion, file missing, ...).
    #[error("persistence connection error: {0}")]
    Connection(String),

    /// A write violated a constraint or otherwise failed integrity checks.
    #[error("persistence query error: {0}")]
    Query(String),

    /// A value read back from the store failed to deserialize.
    #[error("persistence serialization error: {0}")]
    Serialization(String),

    /// `create_instance` was called with an `instance_id` that already exists.
    #[error("instance already exists: {0}")]
    AlreadyExists(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistenceError::InstanceNotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut => PersistenceError::Connection("connection pool timed out".to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) => PersistenceError::Connection(err.to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PersistenceError::AlreadyExists(db_err.to_string())
            }
            other => PersistenceError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
