// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-instance mutex map serializing concurrent transitions on one
//! `instance_id` (§4.3, §5).

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lazily creates and hands out one [`tokio::sync::Mutex`] per instance ID,
/// so two concurrent `advance`/`resume` calls on the same instance are
/// serialized while calls on different instances proceed independently.
pub struct InstanceLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InstanceLockRegistry {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    /// Returns the lock for `instance_id`, creating it if this is the first
    /// transition seen for that instance.
    pub fn lock_for(&self, instance_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(instance_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Drops the registry entries for instances whose lock is uncontended
    /// (no other holder, no pending waiter observed at the instant of the
    /// sweep). Safe to call periodically; a lock recreated immediately after
    /// eviction is functionally identical to the evicted one.
    pub fn evict_uncontended(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for InstanceLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_instance_id_returns_the_same_lock() {
        let registry = InstanceLockRegistry::new();
        let a = registry.lock_for("instance-1");
        let b = registry.lock_for("instance-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_instance_ids_get_distinct_locks() {
        let registry = InstanceLockRegistry::new();
        let a = registry.lock_for("instance-1");
        let b = registry.lock_for("instance-2");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn concurrent_transitions_on_one_instance_serialize() {
        let registry = Arc::new(InstanceLockRegistry::new());
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let registry = registry.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let lock = registry.lock_for("shared");
                let _guard = lock.lock().await;
                order.lock().await.push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(order.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn evict_uncontended_drops_unheld_locks() {
        let registry = InstanceLockRegistry::new();
        {
            let _lock = registry.lock_for("transient");
        }
        registry.evict_uncontended();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn evict_uncontended_keeps_held_locks() {
        let registry = InstanceLockRegistry::new();
        let held = registry.lock_for("held");
        let _guard = held.lock().await;
        registry.evict_uncontended();
        assert_eq!(registry.len(), 1);
    }
}
