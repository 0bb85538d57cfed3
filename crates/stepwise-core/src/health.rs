// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Health check registry aggregating the Persistence Repository and AI
//! Client reachability checks (§10.5).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self { status: HealthStatus::Healthy, error: None }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self { status: HealthStatus::Unhealthy, error: Some(error.into()) }
    }
}

/// Aggregated result across every registered component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: HashMap<String, ComponentHealth>,
}

/// Trait for components that can be health-checked.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_health(&self) -> ComponentHealth;
    fn component_name(&self) -> &str;
}

/// Registry of health checks, run concurrently on demand.
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    pub async fn check_all(&self) -> HealthCheckResult {
        let futures = self.checks.iter().map(|check| async move {
            let name = check.component_name().to_string();
            (name, check.check_health().await)
        });
        let results = futures::future::join_all(futures).await;

        let mut checks = HashMap::new();
        let mut overall = HealthStatus::Healthy;
        for (name, result) in results {
            if result.status == HealthStatus::Unhealthy {
                overall = HealthStatus::Unhealthy;
            }
            checks.insert(name, result);
        }

        HealthCheckResult { status: overall, checks }
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts a [`stepwise_state::PersistenceRepository`] into a [`HealthCheck`].
pub struct PersistenceHealthCheck {
    repository: Arc<dyn stepwise_state::PersistenceRepository>,
}

impl PersistenceHealthCheck {
    pub fn new(repository: Arc<dyn stepwise_state::PersistenceRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl HealthCheck for PersistenceHealthCheck {
    async fn check_health(&self) -> ComponentHealth {
        match self.repository.health_check().await {
            Ok(()) => ComponentHealth::healthy(),
            Err(e) => ComponentHealth::unhealthy(e.to_string()),
        }
    }

    fn component_name(&self) -> &str {
        "persistence"
    }
}

/// Adapts a [`stepwise_ai::AiClient`] into a [`HealthCheck`].
pub struct AiClientHealthCheck {
    client: Arc<dyn stepwise_ai::AiClient>,
}

impl AiClientHealthCheck {
    pub fn new(client: Arc<dyn stepwise_ai::AiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for AiClientHealthCheck {
    async fn check_health(&self) -> ComponentHealth {
        match self.client.health_check().await {
            Ok(()) => ComponentHealth::healthy(),
            Err(e) => ComponentHealth::unhealthy(e.to_string()),
        }
    }

    fn component_name(&self) -> &str {
        "ai_client"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_ai::StubAiClient;
    use stepwise_state::SqliteStore;

    #[tokio::test]
    async fn registry_reports_healthy_when_all_components_are_reachable() {
        let mut registry = HealthRegistry::new();
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        registry.register(Arc::new(PersistenceHealthCheck::new(store)));
        registry.register(Arc::new(AiClientHealthCheck::new(Arc::new(StubAiClient::new()))));

        let result = registry.check_all().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.checks.len(), 2);
    }

    #[tokio::test]
    async fn empty_registry_is_healthy_by_default() {
        let registry = HealthRegistry::new();
        let result = registry.check_all().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert!(result.checks.is_empty());
    }
}
