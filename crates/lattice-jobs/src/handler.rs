//! Job handler trait and execution context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{InferenceState, SharedInferenceState};
use lattice_core::{Error, Result};

use crate::registry::JobRegistry;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being executed.
    pub job_id: Uuid,
    /// Job parameters as supplied at start.
    pub payload: JsonValue,
    /// Cooperative cancellation signal for this job.
    pub cancel: CancelToken,
    /// Registry the job reports cancellation snapshots to.
    pub registry: JobRegistry,
    /// Per-job inference accumulator, shared with in-flight AI operations.
    pub state: SharedInferenceState,
}

impl JobContext {
    pub fn new(job_id: Uuid, payload: JsonValue, cancel: CancelToken, registry: JobRegistry) -> Self {
        Self {
            job_id,
            payload,
            cancel,
            registry,
            state: Arc::new(Mutex::new(InferenceState::new())),
        }
    }

    /// Deserialize the payload into the handler's parameter type.
    pub fn params<P: DeserializeOwned>(&self) -> Result<P> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| Error::Job(format!("Invalid job payload: {}", e)))
    }
}

/// Trait for job handlers.
///
/// A handler owns its collaborators (graph store, AI backends) and is
/// registered with the runner under its `job_name`. One handler instance
/// serves many concurrent jobs.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Stable name jobs of this kind are started under.
    fn job_name(&self) -> &'static str;

    /// Execute the job to completion, returning its JSON result.
    async fn execute(&self, ctx: JobContext) -> Result<JsonValue>;
}
