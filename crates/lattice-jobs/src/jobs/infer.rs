//! Entity inference job: one AI operation over a text source, with
//! cancellation capture.
//!
//! The inference backend writes into the job's shared state as it works.
//! On cancellation the in-flight call is drained under wait-for-completion
//! policy and the state is snapshotted into the registry, so everything
//! inferred before the cancel remains readable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{ProposedEntity, SharedInferenceState, TextSource};
use lattice_core::ontology::{Authentication, VersionedUrl};
use lattice_core::traits::GraphStore;
use lattice_core::{Result, TokenUsage};

use lattice_inference::provider::InferenceBackend;

use crate::handler::{JobContext, JobHandler};
use crate::invoke::{invoke, OperationPolicy};
use crate::registry::with_cancellation_capture;

/// Parameters for an entity inference job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferEntitiesParams {
    pub authentication: Authentication,
    pub source: TextSource,
    /// Entity types the backend may propose instances of.
    pub entity_type_ids: Vec<VersionedUrl>,
}

/// Result of a completed inference job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceReport {
    pub proposed_entities: Vec<ProposedEntity>,
    pub usage: TokenUsage,
}

/// Infer entities from one text source.
#[instrument(skip_all, fields(subsystem = "jobs", op = "infer_entities"))]
pub async fn infer_entities_from_source(
    graph: &dyn GraphStore,
    inference: &dyn InferenceBackend,
    params: &InferEntitiesParams,
    state: &SharedInferenceState,
    cancel: &CancelToken,
) -> Result<InferenceReport> {
    let entity_types = invoke(
        "get_dereferenced_entity_types",
        OperationPolicy::graph(),
        cancel,
        || graph.get_dereferenced_entity_types(params.authentication, &params.entity_type_ids),
    )
    .await?;

    let status = invoke("infer_entities", OperationPolicy::ai(), cancel, || {
        inference.infer_entities(&params.source, &entity_types, state.clone(), cancel.clone())
    })
    .await?;

    let report = InferenceReport {
        proposed_entities: status.first_batch_proposals().to_vec(),
        usage: status.usage,
    };
    info!(
        item_count = report.proposed_entities.len(),
        total_tokens = report.usage.total_tokens,
        "Entity inference complete"
    );
    Ok(report)
}

/// Handler for entity inference jobs.
pub struct InferEntitiesHandler {
    graph: Arc<dyn GraphStore>,
    inference: Arc<dyn InferenceBackend>,
}

impl InferEntitiesHandler {
    pub fn new(graph: Arc<dyn GraphStore>, inference: Arc<dyn InferenceBackend>) -> Self {
        Self { graph, inference }
    }
}

#[async_trait]
impl JobHandler for InferEntitiesHandler {
    fn job_name(&self) -> &'static str {
        "infer_entities"
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        let params: InferEntitiesParams = ctx.params()?;
        let report = with_cancellation_capture(
            &ctx.registry,
            ctx.job_id,
            &ctx.state,
            &ctx.cancel,
            infer_entities_from_source(
                self.graph.as_ref(),
                self.inference.as_ref(),
                &params,
                &ctx.state,
                &ctx.cancel,
            ),
        )
        .await?;
        Ok(serde_json::to_value(report)?)
    }
}
