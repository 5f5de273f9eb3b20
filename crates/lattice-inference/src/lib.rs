//! # lattice-inference
//!
//! AI collaborator backends for lattice.
//!
//! This crate provides:
//! - The [`EmbeddingBackend`], [`InferenceBackend`], and [`WebSearchBackend`]
//!   traits the orchestration layer invokes as opaque remote operations
//! - Embedding input construction per graph object kind
//! - An Ollama HTTP embedding backend
//! - Deterministic mock backends for testing

pub mod embeddings;
pub mod mock;
pub mod ollama;
pub mod provider;

pub use embeddings::{
    create_data_type_embeddings, create_entity_embeddings, create_entity_type_embeddings,
    create_property_type_embeddings,
};
pub use mock::{MockAiBackend, MockCall};
pub use ollama::OllamaBackend;
pub use provider::{EmbeddingBackend, InferenceBackend, WebSearchBackend};
