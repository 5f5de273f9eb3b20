//! AI collaborator traits.
//!
//! Each trait is one external remote operation family with a typed contract.
//! The orchestration layer treats all of them as opaque: it sequences,
//! retries, cancels, and aggregates, but never looks inside.

use async_trait::async_trait;

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{
    InferenceStatus, SharedInferenceState, TextSource, WebSearchResult,
};
use lattice_core::ontology::DereferencedEntityType;
use lattice_core::{Result, TokenUsage};

/// Generates embedding vectors for texts.
///
/// No retry contract of its own: callers cap it at one attempt because the
/// operation is billed and not replay-safe.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed the given texts, one vector per input, in input order.
    /// An empty input yields no vectors and zero usage.
    async fn embed_texts(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, TokenUsage)>;

    /// Vector dimension this backend produces.
    fn dimension(&self) -> usize;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// Infers entities from a textual source.
///
/// The backend appends to the shared inference state as it works and
/// observes `cancel`: once the signal is raised it stops starting new work,
/// finishes the step in flight, and returns its last known state. Partial
/// output is therefore never lost even when the owning job was told to stop.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn infer_entities(
        &self,
        source: &TextSource,
        entity_types: &[DereferencedEntityType],
        state: SharedInferenceState,
        cancel: CancelToken,
    ) -> Result<InferenceStatus>;
}

/// Web search and page-text extraction.
#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    /// Ranked search results for a query, best first.
    async fn search(&self, query: &str) -> Result<Vec<WebSearchResult>>;

    /// Extracted text content of the page at `url`.
    async fn page_text(&self, url: &str) -> Result<String>;
}
