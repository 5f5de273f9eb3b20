//! # lattice-jobs
//!
//! Durable orchestration of AI enrichment jobs over an external knowledge
//! graph.
//!
//! This crate provides:
//! - Policy-driven invocation of remote operations (timeout, retry,
//!   cancellation mode)
//! - A cursor batch driver and a bounded fan-out executor
//! - A job registry with cancellation capture and partial-result delivery
//! - Job definitions: embedding backfills per graph object kind, entity
//!   inference, and web research
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lattice_jobs::{JobRunner, RunnerConfig};
//! use lattice_jobs::jobs::embeddings::AllEntityEmbeddingsHandler;
//!
//! let runner = JobRunner::builder()
//!     .with_config(RunnerConfig::from_env())
//!     .with_handler(AllEntityEmbeddingsHandler::new(graph, embedding))
//!     .build();
//!
//! let handle = runner.start_job(
//!     "update_all_entity_embeddings",
//!     serde_json::json!({"authentication": {"actor_id": admin_id}}),
//! )?;
//! let report = handle.wait().await?;
//! ```

pub mod batch;
pub mod fanout;
pub mod handler;
pub mod invoke;
pub mod jobs;
pub mod registry;
pub mod runner;

// Re-export core types
pub use lattice_core::*;

pub use batch::{for_each_page, BatchStats};
pub use fanout::run_bounded;
pub use handler::{JobContext, JobHandler};
pub use invoke::{invoke, CancellationMode, OperationPolicy};
pub use registry::{with_cancellation_capture, JobRegistry, JobStatus};
pub use runner::{JobHandle, JobRunner, RunnerBuilder, RunnerConfig, RunnerEvent};
