//! Job registry: live job tracking and cancellation-time snapshot delivery.
//!
//! When a job observes cancellation it finishes its in-flight AI operation,
//! captures the shared inference state, and parks the snapshot here. Callers
//! poll [`JobRegistry::read_partial`] to retrieve what was inferred before
//! the cancel landed; the read is idempotent.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{InferenceSnapshot, SharedInferenceState};
use lattice_core::{Error, Result};

/// Lifecycle phase of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Executing normally.
    Running,
    /// Cancellation observed; the in-flight operation is being drained
    /// before the snapshot is taken.
    Capturing,
    /// Cancelled, with the partial-result snapshot available for reading.
    Cancelled,
}

#[derive(Debug, Clone)]
struct JobEntry {
    job_name: String,
    status: JobStatus,
    snapshot: Option<InferenceSnapshot>,
}

/// Shared registry of in-flight and cancelled jobs.
///
/// Completed and failed jobs are removed immediately; only cancelled jobs
/// linger, holding their snapshot until read or reaped.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    entries: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly started job.
    pub fn register(&self, job_id: Uuid, job_name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            job_id,
            JobEntry {
                job_name: job_name.to_string(),
                status: JobStatus::Running,
                snapshot: None,
            },
        );
    }

    /// Current status, if the job is still tracked.
    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&job_id).map(|entry| entry.status)
    }

    /// Job ids currently tracked, in no particular order.
    pub fn job_ids(&self) -> Vec<Uuid> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().copied().collect()
    }

    fn mark_capturing(&self, job_id: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&job_id) {
            entry.status = JobStatus::Capturing;
        }
    }

    /// Drop the entry for a job that finished normally.
    pub fn complete(&self, job_id: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&job_id);
    }

    /// Drop the entry for a job that failed.
    pub fn fail(&self, job_id: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&job_id);
    }

    /// Park the cancellation snapshot and move the job to `Cancelled`.
    pub fn cancel_with_snapshot(&self, job_id: Uuid, snapshot: InferenceSnapshot) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&job_id) {
            info!(
                job_id = %job_id,
                job_name = %entry.job_name,
                proposed = snapshot.state.proposed_entities.len(),
                "Job cancelled, snapshot parked"
            );
            entry.status = JobStatus::Cancelled;
            entry.snapshot = Some(snapshot);
        } else {
            warn!(job_id = %job_id, "Snapshot for unregistered job discarded");
        }
    }

    /// Read the partial-result snapshot of a cancelled job.
    ///
    /// Returns `None` while the job is running or capturing, and for unknown
    /// ids. Reading does not consume the snapshot.
    pub fn read_partial(&self, job_id: Uuid) -> Option<InferenceSnapshot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&job_id).and_then(|entry| entry.snapshot.clone())
    }

    /// Remove cancelled entries whose snapshot is older than `max_age`.
    /// Returns how many were removed. Running jobs are never reaped.
    pub fn reap(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|job_id, entry| match &entry.snapshot {
            Some(snapshot) if snapshot.captured_at < cutoff => {
                debug!(job_id = %job_id, job_name = %entry.job_name, "Reaping expired snapshot");
                false
            }
            _ => true,
        });
        before - entries.len()
    }
}

/// Run a job body under cancellation capture.
///
/// While `op` runs, cancellation is watched. If the token fires first, the
/// job moves to `Capturing`, `op` is driven to completion anyway (its AI
/// steps run under wait-for-completion policy and keep writing into
/// `state`), the shared state is snapshotted into the registry, and the call
/// returns [`Error::Cancelled`]. Without cancellation the result of `op`
/// passes through untouched.
pub async fn with_cancellation_capture<T, Fut>(
    registry: &JobRegistry,
    job_id: Uuid,
    state: &SharedInferenceState,
    cancel: &CancelToken,
    op: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::pin!(op);

    let result = tokio::select! {
        result = &mut op => return result,
        _ = cancel.cancelled() => {
            registry.mark_capturing(job_id);
            debug!(job_id = %job_id, "Cancellation observed, draining in-flight work");
            op.await
        }
    };

    let snapshot = {
        let state = state.lock().unwrap_or_else(|e| e.into_inner());
        InferenceSnapshot::capture(state.clone())
    };
    registry.cancel_with_snapshot(job_id, snapshot);

    // The drained result is discarded in favor of the cancellation signal;
    // its effects live on in the snapshot.
    drop(result);
    Err(Error::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    use lattice_core::cancel::CancelHandle;
    use lattice_core::inference::InferenceState;
    use lattice_core::TokenUsage;
    use std::sync::Mutex;

    fn shared_state() -> SharedInferenceState {
        Arc::new(Mutex::new(InferenceState::new()))
    }

    #[test]
    fn test_register_and_complete_lifecycle() {
        let registry = JobRegistry::new();
        let job_id = Uuid::new_v4();

        registry.register(job_id, "embed_backfill");
        assert_eq!(registry.status(job_id), Some(JobStatus::Running));

        registry.complete(job_id);
        assert_eq!(registry.status(job_id), None);
        assert!(registry.read_partial(job_id).is_none());
    }

    #[test]
    fn test_read_partial_is_idempotent() {
        let registry = JobRegistry::new();
        let job_id = Uuid::new_v4();
        registry.register(job_id, "research");

        let mut state = InferenceState::new();
        state.usage = TokenUsage::new(5, 9);
        registry.cancel_with_snapshot(job_id, InferenceSnapshot::capture(state));

        let first = registry.read_partial(job_id).unwrap();
        let second = registry.read_partial(job_id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.state.usage, TokenUsage::new(5, 9));
        assert_eq!(registry.status(job_id), Some(JobStatus::Cancelled));
    }

    #[test]
    fn test_read_partial_none_while_running() {
        let registry = JobRegistry::new();
        let job_id = Uuid::new_v4();
        registry.register(job_id, "research");
        assert!(registry.read_partial(job_id).is_none());
    }

    #[test]
    fn test_reap_removes_only_expired_snapshots() {
        let registry = JobRegistry::new();

        let expired = Uuid::new_v4();
        registry.register(expired, "research");
        let mut old_snapshot = InferenceSnapshot::capture(InferenceState::new());
        old_snapshot.captured_at = Utc::now() - Duration::hours(2);
        registry.cancel_with_snapshot(expired, old_snapshot);

        let fresh = Uuid::new_v4();
        registry.register(fresh, "research");
        registry.cancel_with_snapshot(fresh, InferenceSnapshot::capture(InferenceState::new()));

        let running = Uuid::new_v4();
        registry.register(running, "embed_backfill");

        assert_eq!(registry.reap(Duration::hours(1)), 1);
        assert!(registry.read_partial(expired).is_none());
        assert!(registry.read_partial(fresh).is_some());
        assert_eq!(registry.status(running), Some(JobStatus::Running));
    }

    #[tokio::test]
    async fn test_capture_passes_through_without_cancel() {
        let registry = JobRegistry::new();
        let job_id = Uuid::new_v4();
        registry.register(job_id, "research");
        let state = shared_state();
        let token = CancelToken::never();

        let result =
            with_cancellation_capture(&registry, job_id, &state, &token, async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        // The entry stays; completion is the runner's call.
        assert_eq!(registry.status(job_id), Some(JobStatus::Running));
    }

    #[tokio::test]
    async fn test_capture_drains_and_snapshots_on_cancel() {
        let registry = JobRegistry::new();
        let job_id = Uuid::new_v4();
        registry.register(job_id, "research");
        let state = shared_state();
        let (handle, token) = CancelHandle::new();

        let body_state = state.clone();
        let body = async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            // Work that lands after the cancel must still reach the snapshot.
            body_state.lock().unwrap().usage += TokenUsage::new(11, 13);
            Ok(())
        };

        let registry_clone = registry.clone();
        let state_clone = state.clone();
        let task = tokio::spawn(async move {
            with_cancellation_capture(&registry_clone, job_id, &state_clone, &token, body).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));

        let snapshot = registry.read_partial(job_id).unwrap();
        assert_eq!(snapshot.state.usage, TokenUsage::new(11, 13));
        assert_eq!(registry.status(job_id), Some(JobStatus::Cancelled));
    }
}
