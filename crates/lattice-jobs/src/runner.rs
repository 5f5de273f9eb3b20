//! Job runner: starts named jobs, tracks them in the registry, and emits
//! lifecycle events.
//!
//! Unlike a queue-polling worker, jobs here are started directly by the
//! caller and run until they finish, fail, or are cancelled through their
//! [`JobHandle`] or a runner-wide [`JobRunner::shutdown`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lattice_core::cancel::CancelHandle;
use lattice_core::{Error, Result};

use crate::handler::{JobContext, JobHandler};
use crate::registry::JobRegistry;

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Whether new jobs may be started.
    pub enabled: bool,
    /// Maximum number of jobs running at once.
    pub max_concurrent_jobs: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_jobs: lattice_core::defaults::JOB_MAX_CONCURRENT,
        }
    }
}

impl RunnerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LATTICE_JOBS_ENABLED` | `true` | Enable/disable job starts |
    /// | `LATTICE_JOBS_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    pub fn from_env() -> Self {
        let enabled = std::env::var("LATTICE_JOBS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("LATTICE_JOBS_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(lattice_core::defaults::JOB_MAX_CONCURRENT)
            .max(1);

        Self {
            enabled,
            max_concurrent_jobs,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

/// Event emitted by the job runner.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, job_name: String },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_name: String },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        job_name: String,
        error: String,
    },
    /// A job was cancelled. `partial` says whether a snapshot was parked in
    /// the registry.
    JobCancelled {
        job_id: Uuid,
        job_name: String,
        partial: bool,
    },
}

/// Handle for one started job.
pub struct JobHandle {
    pub job_id: Uuid,
    cancel: Arc<CancelHandle>,
    join: JoinHandle<Result<JsonValue>>,
}

impl JobHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the job to finish and return its result.
    pub async fn wait(self) -> Result<JsonValue> {
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Job task panicked: {}", e)))?
    }
}

/// Job runner with registered handlers.
pub struct JobRunner {
    config: RunnerConfig,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    registry: JobRegistry,
    active: Arc<Mutex<HashMap<Uuid, Arc<CancelHandle>>>>,
    event_tx: broadcast::Sender<RunnerEvent>,
}

impl JobRunner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::default()
    }

    /// The registry this runner reports into.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Get a receiver for runner events.
    pub fn events(&self) -> broadcast::Receiver<RunnerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of jobs currently running.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Signal cancellation to every running job.
    ///
    /// Jobs drain their in-flight operations per their own policies; callers
    /// that need to wait do so on the individual handles.
    pub fn shutdown(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        info!(active = active.len(), "Runner shutdown, cancelling jobs");
        for handle in active.values() {
            handle.cancel();
        }
    }

    /// Start a job under a fresh id.
    pub fn start_job(&self, job_name: &str, payload: JsonValue) -> Result<JobHandle> {
        self.start_job_with_id(Uuid::new_v4(), job_name, payload)
    }

    /// Start a job under a caller-chosen id.
    ///
    /// Callers that key jobs by identity (one backfill per account, say) use
    /// this to make duplicate starts detectable.
    pub fn start_job_with_id(
        &self,
        job_id: Uuid,
        job_name: &str,
        payload: JsonValue,
    ) -> Result<JobHandle> {
        if !self.config.enabled {
            return Err(Error::Job("Job runner is disabled".into()));
        }

        let handler = self
            .handlers
            .get(job_name)
            .cloned()
            .ok_or_else(|| Error::Job(format!("No handler for job '{}'", job_name)))?;

        if self.registry.status(job_id).is_some() {
            return Err(Error::Job(format!("Job {} is already tracked", job_id)));
        }

        let cancel = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if active.len() >= self.config.max_concurrent_jobs {
                return Err(Error::Job(format!(
                    "Concurrency limit of {} reached",
                    self.config.max_concurrent_jobs
                )));
            }
            let (handle, _token) = CancelHandle::new();
            let handle = Arc::new(handle);
            active.insert(job_id, handle.clone());
            handle
        };

        let job_name = handler.job_name();
        self.registry.register(job_id, job_name);

        info!(job_id = %job_id, job_name, "Starting job");
        let _ = self.event_tx.send(RunnerEvent::JobStarted {
            job_id,
            job_name: job_name.to_string(),
        });

        let registry = self.registry.clone();
        let active = self.active.clone();
        let event_tx = self.event_tx.clone();
        let ctx = JobContext::new(job_id, payload, cancel.token(), registry.clone());

        let join = tokio::spawn(async move {
            let start = Instant::now();
            // A panicking handler must still release its concurrency slot and
            // registry entry, so the panic is converted into a failure here
            // rather than surfacing as a `JoinError`.
            let result = match AssertUnwindSafe(handler.execute(ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    Err(Error::Internal(format!("Job handler panicked: {message}")))
                }
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            active
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&job_id);

            match &result {
                Ok(_) => {
                    registry.complete(job_id);
                    info!(job_id = %job_id, job_name, duration_ms, "Job completed");
                    let _ = event_tx.send(RunnerEvent::JobCompleted {
                        job_id,
                        job_name: job_name.to_string(),
                    });
                }
                Err(Error::Cancelled) => {
                    // A snapshot-carrying cancel leaves its registry entry in
                    // place; a plain cancel has nothing to serve.
                    let partial = registry.read_partial(job_id).is_some();
                    if !partial {
                        registry.fail(job_id);
                    }
                    info!(job_id = %job_id, job_name, duration_ms, partial, "Job cancelled");
                    let _ = event_tx.send(RunnerEvent::JobCancelled {
                        job_id,
                        job_name: job_name.to_string(),
                        partial,
                    });
                }
                Err(e) => {
                    registry.fail(job_id);
                    error!(job_id = %job_id, job_name, duration_ms, error = %e, "Job failed");
                    let _ = event_tx.send(RunnerEvent::JobFailed {
                        job_id,
                        job_name: job_name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
            result
        });

        Ok(JobHandle {
            job_id,
            cancel,
            join,
        })
    }
}

/// Builder for creating a job runner with handlers.
#[derive(Default)]
pub struct RunnerBuilder {
    config: Option<RunnerConfig>,
    handlers: Vec<Arc<dyn JobHandler>>,
    registry: Option<JobRegistry>,
}

impl RunnerBuilder {
    /// Set the runner configuration.
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Use an existing registry instead of a fresh one.
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the runner.
    pub fn build(self) -> JobRunner {
        let (event_tx, _) = broadcast::channel(lattice_core::defaults::EVENT_BUS_CAPACITY);

        let mut handlers: HashMap<&'static str, Arc<dyn JobHandler>> = HashMap::new();
        for handler in self.handlers {
            let name = handler.job_name();
            if handlers.insert(name, handler).is_some() {
                warn!(job_name = name, "Replacing previously registered handler");
            } else {
                debug!(job_name = name, "Registered job handler");
            }
        }

        JobRunner {
            config: self.config.unwrap_or_default(),
            handlers,
            registry: self.registry.unwrap_or_default(),
            active: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        }
    }
}
