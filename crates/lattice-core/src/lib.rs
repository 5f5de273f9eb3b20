//! # lattice-core
//!
//! Core types, traits, and abstractions for the lattice library.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other lattice crates depend on: the graph object model, structural
//! query filters, the usage-counter monoid, inference contract types, the
//! classified error type, and the [`GraphStore`] collaborator trait.

pub mod cancel;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod inference;
pub mod logging;
pub mod ontology;
pub mod traits;
pub mod usage;

// Re-export commonly used types at crate root
pub use cancel::{CancelHandle, CancelToken};
pub use error::{Error, Result};
pub use filter::{Filter, FilterExpression};
pub use inference::{
    EmbeddingOutput, InferenceBatch, InferenceSnapshot, InferenceState, InferenceStatus,
    InferredEntityResult, ProposedEntity, ProposedEntitySummary, SharedInferenceState, TextSource,
    WebPage, WebSearchResult,
};
pub use ontology::*;
pub use traits::{EmbeddingUpdate, GraphStore, StructuralQuery};
pub use usage::TokenUsage;
