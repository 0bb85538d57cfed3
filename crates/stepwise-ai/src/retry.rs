// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wire-level retry policy for AI transport calls (§4.4).
//!
//! The policy is deliberately narrow: one immediate retry on timeout or a
//! 5xx API error, no retry otherwise, and it is entirely internal to the AI
//! client — the engine never sees a retried call, only the final outcome.

use crate::error::{AiClientError, AiClientResult};
use std::future::Future;
use tracing::warn;

/// Run `op` once; if it fails with a retryable [`AiClientError`], run it
/// exactly one more time and return that outcome regardless of success.
pub async fn with_one_retry<F, Fut, T>(op_name: &str, mut op: F) -> AiClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AiClientResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            warn!(operation = op_name, error = %err, "retrying AI transport call once");
            op().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_success() {
        let calls = AtomicUsize::new(0);
        let result: AiClientResult<u32> = with_one_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_once_on_timeout_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result: AiClientResult<u32> = with_one_retry("test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(AiClientError::Timeout(std::time::Duration::from_secs(1)))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_error() {
        let calls = AtomicUsize::new(0);
        let result: AiClientResult<u32> = with_one_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiClientError::InvalidResponse("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let calls = AtomicUsize::new(0);
        let result: AiClientResult<u32> = with_one_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiClientError::ApiError { status: 503, body: String::new() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
