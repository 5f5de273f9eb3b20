//! Shared contract types for entity inference and embedding generation.
//!
//! The AI collaborators are opaque remote operations; these types fix their
//! inputs and outputs. [`InferenceState`] is the mutable per-job accumulator
//! that makes cancellation-safe partial-result delivery possible: the job is
//! its single writer, and a read-only [`InferenceSnapshot`] is exposed
//! externally when the job is cancelled.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ontology::{Embedding, EntityId, EntityProperties, VersionedUrl};
use crate::usage::TokenUsage;

/// Inference state shared between a job and its in-flight AI operation.
///
/// The job is the single writer through the operation; the lock is held only
/// for field-level updates, never across awaits. The cancellation path takes
/// a snapshot through the same handle.
pub type SharedInferenceState = Arc<Mutex<InferenceState>>;

// =============================================================================
// WEB SOURCES
// =============================================================================

/// One ranked result from the web search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub url: String,
    pub title: String,
}

/// A web page with its extracted text, as handed to the inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    pub text_content: String,
}

/// Any textual source entities can be inferred from: a fetched web page or
/// a caller-supplied document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub text: String,
}

impl From<WebPage> for TextSource {
    fn from(page: WebPage) -> Self {
        Self {
            title: Some(page.title),
            url: Some(page.url),
            text: page.text_content,
        }
    }
}

// =============================================================================
// PROPOSED ENTITIES
// =============================================================================

/// An entity the inference backend proposes to create, keyed by a temporary
/// id that is only meaningful within one inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedEntity {
    pub temporary_id: i64,
    pub entity_type_id: VersionedUrl,
    pub properties: EntityProperties,
}

/// A one-line summary of a proposed entity, produced before its full
/// property set is inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEntitySummary {
    pub temporary_id: i64,
    pub entity_type_id: VersionedUrl,
    pub summary: String,
}

/// Finalized outcome for one proposed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InferredEntityResult {
    /// The entity was written to the graph.
    Created { entity_id: EntityId },
    /// The proposal was abandoned.
    Failed { reason: String },
}

// =============================================================================
// INFERENCE STATE
// =============================================================================

/// Mutable per-job inference accumulator.
///
/// Shared single-writer state: only the owning job mutates it. On
/// cancellation an immutable copy is captured as an [`InferenceSnapshot`]
/// and served through the job registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceState {
    /// How many inference iterations have run.
    pub iteration_count: u32,
    /// Temporary ids currently being worked on.
    pub in_progress_entity_ids: Vec<i64>,
    /// Provisional one-line summaries of proposed entities.
    pub proposed_entity_summaries: Vec<ProposedEntitySummary>,
    /// Fully inferred entity proposals.
    pub proposed_entities: Vec<ProposedEntity>,
    /// Finalized results keyed by temporary id.
    pub results_by_temporary_id: BTreeMap<i64, InferredEntityResult>,
    /// Usage accumulated across all inference calls so far.
    pub usage: TokenUsage,
}

impl InferenceState {
    /// Fresh state for a new inference run.
    pub fn new() -> Self {
        Self {
            iteration_count: 1,
            ..Self::default()
        }
    }
}

/// Immutable copy of an [`InferenceState`] taken at the moment cancellation
/// was observed. Owned by the job registry until read or reaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSnapshot {
    pub state: InferenceState,
    pub captured_at: DateTime<Utc>,
}

impl InferenceSnapshot {
    /// Capture the given state now.
    pub fn capture(state: InferenceState) -> Self {
        Self {
            state,
            captured_at: Utc::now(),
        }
    }
}

// =============================================================================
// INFERENCE RESULTS
// =============================================================================

/// One batch of proposals from a single inference pass over a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceBatch {
    pub proposed_entities: Vec<ProposedEntity>,
}

/// Final status returned by an entity inference operation.
///
/// `contents` holds one batch per inference pass; consumers that only want
/// the primary proposals take the first batch. Duplicate proposals across
/// later batches of the same source are not deduplicated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStatus {
    pub contents: Vec<InferenceBatch>,
    pub usage: TokenUsage,
}

impl InferenceStatus {
    /// Proposals from the first batch, or empty if no pass produced any.
    pub fn first_batch_proposals(&self) -> &[ProposedEntity] {
        self.contents
            .first()
            .map(|batch| batch.proposed_entities.as_slice())
            .unwrap_or_default()
    }
}

// =============================================================================
// EMBEDDING OUTPUT
// =============================================================================

/// Result of one embedding-generation operation: zero or more vectors plus
/// the usage the call consumed. Zero vectors (e.g., every property was
/// empty) is a valid outcome; usage is still reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Embedding>,
    pub usage: TokenUsage,
}
