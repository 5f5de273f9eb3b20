//! Operation invoker: a single remote call with timeout, retry, and
//! cancellation policy.
//!
//! Every remote step of a job goes through [`invoke`]. The invoker is a
//! pass-through wrapper: it classifies failures and enforces policy but has
//! no side effects beyond the remote call itself.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use lattice_core::cancel::CancelToken;
use lattice_core::{Error, Result};

/// What happens to an in-flight operation when its job is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationMode {
    /// The operation is allowed to finish and return its last known state
    /// even after the cancellation signal is raised upstream. Required
    /// wherever partial output must never be lost.
    WaitForCompletion,
    /// The operation future is dropped as soon as cancellation is observed.
    /// Only safe for reads and idempotent writes.
    Abandon,
}

/// Per-call execution policy: timeout, attempt budget, cancellation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPolicy {
    pub timeout: Duration,
    /// Total attempts including the first; `1` means no retry.
    pub max_attempts: u32,
    pub cancellation_mode: CancellationMode,
}

impl OperationPolicy {
    /// Policy for AI operations (entity inference, embedding generation):
    /// long timeout, exactly one attempt, never abandoned mid-flight.
    /// These calls are expensive and not replay-safe.
    pub fn ai() -> Self {
        Self {
            timeout: Duration::from_secs(lattice_core::defaults::AI_OPERATION_TIMEOUT_SECS),
            max_attempts: lattice_core::defaults::AI_OPERATION_MAX_ATTEMPTS,
            cancellation_mode: CancellationMode::WaitForCompletion,
        }
    }

    /// Policy for graph store operations (queries, embedding writes): short
    /// timeout, retried, abandoned on cancellation. These calls are cheap
    /// and idempotent.
    pub fn graph() -> Self {
        Self {
            timeout: Duration::from_secs(lattice_core::defaults::GRAPH_OPERATION_TIMEOUT_SECS),
            max_attempts: lattice_core::defaults::GRAPH_OPERATION_MAX_ATTEMPTS,
            cancellation_mode: CancellationMode::Abandon,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_cancellation_mode(mut self, mode: CancellationMode) -> Self {
        self.cancellation_mode = mode;
        self
    }
}

/// Execute one named remote operation under a policy.
///
/// `op` is called once per attempt and must produce a fresh future each
/// time. Failures bubble to the owning job unchanged after the attempt
/// budget is exhausted; a timeout surfaces as [`Error::Timeout`], distinct
/// from a remote-reported error.
pub async fn invoke<T, F, Fut>(
    operation: &str,
    policy: OperationPolicy,
    cancel: &CancelToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 1..=policy.max_attempts {
        if policy.cancellation_mode == CancellationMode::Abandon && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outcome = match policy.cancellation_mode {
            CancellationMode::WaitForCompletion => {
                tokio::time::timeout(policy.timeout, op()).await
            }
            CancellationMode::Abandon => {
                tokio::select! {
                    outcome = tokio::time::timeout(policy.timeout, op()) => outcome,
                    _ = cancel.cancelled() => {
                        debug!(op = operation, attempt, "Operation abandoned on cancellation");
                        return Err(Error::Cancelled);
                    }
                }
            }
        };

        let error = match outcome {
            Ok(Ok(value)) => {
                debug!(op = operation, attempt, "Operation succeeded");
                return Ok(value);
            }
            Ok(Err(error)) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                error
            }
            Err(_elapsed) => Error::Timeout {
                operation: operation.to_string(),
                timeout: policy.timeout,
            },
        };

        warn!(
            op = operation,
            attempt,
            max_attempts = policy.max_attempts,
            error = %error,
            "Operation attempt failed"
        );
        last_error = Some(error);

        // A cancelled job gets no further attempts regardless of budget.
        if cancel.is_cancelled() {
            break;
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::Internal(format!("operation '{operation}' made no attempts"))))
}
