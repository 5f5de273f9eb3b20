//! Job definitions: embedding backfills, entity inference, research.

pub mod embeddings;
pub mod infer;
pub mod research;
