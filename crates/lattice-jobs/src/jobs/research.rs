//! Research job: web search, bounded per-result inference, flattened
//! proposals.
//!
//! The job runs under the AI assistant's authorization, resolved up front
//! as a hard precondition. Search results beyond the cap are discarded;
//! the survivors are processed concurrently, each with a fresh inference
//! state, and their first-batch proposals are concatenated in result order.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use lattice_core::cancel::CancelToken;
use lattice_core::defaults::MAX_WEB_SEARCH_RESULTS;
use lattice_core::inference::{
    InferenceState, ProposedEntity, SharedInferenceState, TextSource,
};
use lattice_core::ontology::{AccountId, Authentication, VersionedUrl};
use lattice_core::traits::GraphStore;
use lattice_core::{Error, Result, TokenUsage};

use lattice_inference::provider::{InferenceBackend, WebSearchBackend};

use crate::fanout::run_bounded;
use crate::handler::{JobContext, JobHandler};
use crate::invoke::{invoke, OperationPolicy};
use crate::registry::with_cancellation_capture;

/// Parameters for a research job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchParams {
    /// The requesting user's authorization, used to resolve the AI actor.
    pub authentication: Authentication,
    /// Web the AI actor must be able to create entities in.
    pub web_owner_id: AccountId,
    /// Natural-language research prompt, passed to web search verbatim.
    pub query: String,
    /// Entity types the backend may propose instances of.
    pub entity_type_ids: Vec<VersionedUrl>,
}

/// Result of a completed research job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// First-batch proposals from every analyzed source, in search-result
    /// order. Repeated proposals across sources are kept as-is.
    pub proposed_entities: Vec<ProposedEntity>,
    pub usage: TokenUsage,
}

/// Run a research task end to end.
#[instrument(skip_all, fields(subsystem = "jobs", op = "research_entities", query = %params.query))]
pub async fn research_entities(
    graph: &dyn GraphStore,
    inference: &dyn InferenceBackend,
    search: &dyn WebSearchBackend,
    params: &ResearchParams,
    job_state: &SharedInferenceState,
    cancel: &CancelToken,
) -> Result<ResearchReport> {
    let ai_actor = invoke(
        "get_ai_assistant_account_id",
        OperationPolicy::graph(),
        cancel,
        || graph.get_ai_assistant_account_id(params.authentication, params.web_owner_id),
    )
    .await?
    .ok_or_else(|| {
        Error::Precondition(format!(
            "No AI assistant account available in web {}",
            params.web_owner_id
        ))
    })?;
    let ai_authentication = Authentication::new(ai_actor);

    let entity_types = invoke(
        "get_dereferenced_entity_types",
        OperationPolicy::graph(),
        cancel,
        || graph.get_dereferenced_entity_types(ai_authentication, &params.entity_type_ids),
    )
    .await?;

    let results = invoke("web_search", OperationPolicy::ai(), cancel, || {
        search.search(&params.query)
    })
    .await?;
    info!(result_count = results.len(), "Web search complete");

    let outcomes = run_bounded(results, MAX_WEB_SEARCH_RESULTS, |result| {
        let entity_types = &entity_types;
        async move {
            let text = invoke("page_text", OperationPolicy::ai(), cancel, || {
                search.page_text(&result.url)
            })
            .await?;
            let source = TextSource {
                title: Some(result.title.clone()),
                url: Some(result.url.clone()),
                text,
            };

            // Each source gets its own accumulator; temporary ids are only
            // unique within one inference run.
            let state: SharedInferenceState = Arc::new(Mutex::new(InferenceState::new()));
            let status = invoke("infer_entities", OperationPolicy::ai(), cancel, || {
                inference.infer_entities(&source, entity_types, state.clone(), cancel.clone())
            })
            .await?;

            Ok((status.first_batch_proposals().to_vec(), status.usage))
        }
    })
    .await?;

    let mut report = ResearchReport::default();
    for (proposals, usage) in outcomes {
        report.proposed_entities.extend(proposals);
        report.usage += usage;
    }

    // Mirror the outcome into the job-level state so a cancellation snapshot
    // taken after drain carries everything that was inferred.
    {
        let mut state = job_state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .proposed_entities
            .extend(report.proposed_entities.iter().cloned());
        state.usage += report.usage;
    }

    info!(
        item_count = report.proposed_entities.len(),
        total_tokens = report.usage.total_tokens,
        "Research complete"
    );
    Ok(report)
}

/// Handler for research jobs.
pub struct ResearchHandler {
    graph: Arc<dyn GraphStore>,
    inference: Arc<dyn InferenceBackend>,
    search: Arc<dyn WebSearchBackend>,
}

impl ResearchHandler {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        inference: Arc<dyn InferenceBackend>,
        search: Arc<dyn WebSearchBackend>,
    ) -> Self {
        Self {
            graph,
            inference,
            search,
        }
    }
}

#[async_trait]
impl JobHandler for ResearchHandler {
    fn job_name(&self) -> &'static str {
        "research_entities"
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        let params: ResearchParams = ctx.params()?;
        let report = with_cancellation_capture(
            &ctx.registry,
            ctx.job_id,
            &ctx.state,
            &ctx.cancel,
            research_entities(
                self.graph.as_ref(),
                self.inference.as_ref(),
                self.search.as_ref(),
                &params,
                &ctx.state,
                &ctx.cancel,
            ),
        )
        .await?;
        Ok(serde_json::to_value(report)?)
    }
}
