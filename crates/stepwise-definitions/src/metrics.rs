// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for the Definition Service's content-fingerprint
//! cache (§10.5).

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    /// Definition Service cache hit/miss counter.
    pub static ref DEFINITION_CACHE_TOTAL: CounterVec = register_counter_vec!(
        "stepwise_definition_cache_total",
        "Definition Service cache lookups by result",
        &["result"]
    )
    .expect("failed to register stepwise_definition_cache_total");
}

/// Records a Definition Service cache hit or miss.
#[inline]
pub fn record_definition_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    DEFINITION_CACHE_TOTAL.with_label_values(&[result]).inc();
}
