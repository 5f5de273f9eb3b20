//! Mock AI backends for deterministic testing.
//!
//! [`MockAiBackend`] implements every AI collaborator trait with scripted,
//! deterministic behavior: hash-derived embedding vectors, per-source
//! inference scripts with optional step gating for cancellation tests, and
//! canned web search results. Every call is recorded in a call log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{
    InferenceBatch, InferenceStatus, ProposedEntity, ProposedEntitySummary, SharedInferenceState,
    TextSource, WebSearchResult,
};
use lattice_core::ontology::DereferencedEntityType;
use lattice_core::{Error, Result, TokenUsage};

use crate::provider::{EmbeddingBackend, InferenceBackend, WebSearchBackend};

/// One recorded call against the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    tokens_per_text: u64,
    no_vector_markers: Vec<String>,
    embed_failure: Option<String>,
    infer_failure: Option<String>,
    inference_scripts: HashMap<String, Vec<ProposedEntity>>,
    tokens_per_inference_item: u64,
    search_results: Vec<WebSearchResult>,
    page_texts: HashMap<String, String>,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 8,
            tokens_per_text: 10,
            no_vector_markers: Vec::new(),
            embed_failure: None,
            infer_failure: None,
            inference_scripts: HashMap::new(),
            tokens_per_inference_item: 25,
            search_results: Vec::new(),
            page_texts: HashMap::new(),
            latency_ms: 0,
        }
    }
}

/// Mock AI backend for testing.
#[derive(Clone)]
pub struct MockAiBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    /// When set, each inference step waits for one permit before running,
    /// letting tests control exactly how far a run progresses.
    step_permits: Option<Arc<Semaphore>>,
    items_processed: Arc<AtomicUsize>,
}

impl MockAiBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            step_permits: None,
            items_processed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Tokens reported per embedded text.
    pub fn with_tokens_per_text(mut self, tokens: u64) -> Self {
        Arc::make_mut(&mut self.config).tokens_per_text = tokens;
        self
    }

    /// Texts containing `marker` get no vector, but still count usage —
    /// simulating a backend that filters content it cannot embed.
    pub fn with_no_vectors_for(mut self, marker: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .no_vector_markers
            .push(marker.into());
        self
    }

    /// Make every embedding call fail with the given message.
    pub fn with_embed_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).embed_failure = Some(message.into());
        self
    }

    /// Make every inference call fail with the given message.
    pub fn with_infer_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).infer_failure = Some(message.into());
        self
    }

    /// Script the proposals inferred from the source with the given URL.
    pub fn with_inference_script(
        mut self,
        url: impl Into<String>,
        proposals: Vec<ProposedEntity>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .inference_scripts
            .insert(url.into(), proposals);
        self
    }

    /// Tokens reported per inferred item.
    pub fn with_tokens_per_inference_item(mut self, tokens: u64) -> Self {
        Arc::make_mut(&mut self.config).tokens_per_inference_item = tokens;
        self
    }

    /// Canned results for every search query.
    pub fn with_search_results(mut self, results: Vec<WebSearchResult>) -> Self {
        Arc::make_mut(&mut self.config).search_results = results;
        self
    }

    /// Canned extracted text for a URL.
    pub fn with_page_text(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .page_texts
            .insert(url.into(), text.into());
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Gate inference items on permits. The returned semaphore starts with
    /// zero permits; tests release one permit per item they want processed.
    pub fn with_step_gating(mut self) -> (Self, Arc<Semaphore>) {
        let sem = Arc::new(Semaphore::new(0));
        self.step_permits = Some(sem.clone());
        (self, sem)
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of recorded calls for one operation name.
    pub fn call_count(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Number of inference items fully processed across all calls.
    pub fn items_processed(&self) -> usize {
        self.items_processed.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str, input: impl Into<String>) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.into(),
        });
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    /// Deterministic vector derived from the text content.
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let seed: u32 = text.bytes().map(u32::from).sum();
        (0..self.config.dimension)
            .map(|i| ((seed.wrapping_add(i as u32)) % 101) as f32 / 101.0)
            .collect()
    }
}

impl Default for MockAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockAiBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, TokenUsage)> {
        self.record("embed_texts", texts.join(" | "));
        self.simulate_latency().await;

        if let Some(message) = &self.config.embed_failure {
            return Err(Error::Embedding(message.clone()));
        }

        let vectors = texts
            .iter()
            .filter(|text| {
                !self
                    .config
                    .no_vector_markers
                    .iter()
                    .any(|marker| text.contains(marker))
            })
            .map(|text| self.vector_for(text))
            .collect();

        let tokens = self.config.tokens_per_text * texts.len() as u64;
        Ok((vectors, TokenUsage::new(tokens, tokens)))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl InferenceBackend for MockAiBackend {
    async fn infer_entities(
        &self,
        source: &TextSource,
        entity_types: &[DereferencedEntityType],
        state: SharedInferenceState,
        cancel: CancelToken,
    ) -> Result<InferenceStatus> {
        let key = source.url.clone().unwrap_or_default();
        self.record(
            "infer_entities",
            format!("{} ({} types)", key, entity_types.len()),
        );
        self.simulate_latency().await;

        if let Some(message) = &self.config.infer_failure {
            return Err(Error::Inference(message.clone()));
        }

        let script = self
            .config
            .inference_scripts
            .get(&key)
            .cloned()
            .unwrap_or_default();

        let per_item = TokenUsage::new(
            self.config.tokens_per_inference_item,
            self.config.tokens_per_inference_item,
        );
        let mut processed = Vec::new();
        let mut usage = TokenUsage::zero();

        for proposal in script {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(permits) = &self.step_permits {
                tokio::select! {
                    permit = permits.acquire() => {
                        permit
                            .map_err(|_| Error::Internal("step gate closed".into()))?
                            .forget();
                    }
                    _ = cancel.cancelled() => break,
                }
            }

            {
                let mut state = state.lock().unwrap();
                state.in_progress_entity_ids.push(proposal.temporary_id);
                state.proposed_entity_summaries.push(ProposedEntitySummary {
                    temporary_id: proposal.temporary_id,
                    entity_type_id: proposal.entity_type_id.clone(),
                    summary: format!("proposal {}", proposal.temporary_id),
                });
                state.proposed_entities.push(proposal.clone());
                state.in_progress_entity_ids.pop();
                state.usage += per_item;
            }
            self.items_processed.fetch_add(1, Ordering::SeqCst);
            usage += per_item;
            processed.push(proposal);
        }

        Ok(InferenceStatus {
            contents: vec![InferenceBatch {
                proposed_entities: processed,
            }],
            usage,
        })
    }
}

#[async_trait]
impl WebSearchBackend for MockAiBackend {
    async fn search(&self, query: &str) -> Result<Vec<WebSearchResult>> {
        self.record("search", query);
        self.simulate_latency().await;
        Ok(self.config.search_results.clone())
    }

    async fn page_text(&self, url: &str) -> Result<String> {
        self.record("page_text", url);
        self.simulate_latency().await;
        match self.config.page_texts.get(url) {
            Some(text) => Ok(text.clone()),
            None => Ok(format!("extracted text of {url}")),
        }
    }
}
