// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Persistence Repository capability contract (§4.2).

use crate::error::PersistenceResult;
use crate::model::{HistoryEntry, NewHistoryEntry, WorkflowInstance};
use async_trait::async_trait;

/// Capability contract for the Persistence Repository component (§4.2).
///
/// `commit_transition` is the transactional scope primitive the spec
/// requires (§4.2, §9): it performs the one history insert plus one instance
/// update that every `advance`/`resume` transition produces as a single
/// atomic unit, so a caller holding only `&dyn PersistenceRepository` can
/// never observe — or cause — a partial write. Reads are not required to be
/// transactional.
#[async_trait]
pub trait PersistenceRepository: Send + Sync {
    /// Insert a new instance row. Fails with `AlreadyExists` if the ID is taken.
    async fn create_instance(&self, instance: &WorkflowInstance) -> PersistenceResult<()>;

    /// Fetch an instance by ID. Fails with `InstanceNotFound` if absent.
    async fn get_instance(&self, instance_id: &str) -> PersistenceResult<WorkflowInstance>;

    /// Full-record update, used directly only by `start`'s create step;
    /// `advance`/`resume` go through `commit_transition` instead.
    async fn update_instance(&self, instance: &WorkflowInstance) -> PersistenceResult<()>;

    /// Most-recent-first history, capped at `limit` entries if given.
    async fn get_history(&self, instance_id: &str, limit: Option<u32>) -> PersistenceResult<Vec<HistoryEntry>>;

    /// Atomically append `history` and replace the instance row's mutable
    /// fields with `updated_instance`'s. Either both writes land or neither
    /// does (§4.2, invariant 3 in §8).
    async fn commit_transition(
        &self,
        history: NewHistoryEntry,
        updated_instance: &WorkflowInstance,
    ) -> PersistenceResult<HistoryEntry>;

    /// Cheap reachability check, used by the observability health registry.
    async fn health_check(&self) -> PersistenceResult<()>;
}
