//! Centralized default constants for the lattice system.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// OPERATION POLICIES
// =============================================================================

/// Timeout for AI operation calls (entity inference, embedding generation).
/// One hour: inference over a large page can legitimately run this long.
pub const AI_OPERATION_TIMEOUT_SECS: u64 = 3600;

/// Attempt budget for AI operation calls. Exactly one: these operations are
/// expensive and not replay-safe, so they are never blindly retried.
pub const AI_OPERATION_MAX_ATTEMPTS: u32 = 1;

/// Timeout for graph store operation calls (queries and embedding writes).
pub const GRAPH_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Attempt budget for graph store operation calls. These are cheap and
/// idempotent, so transient failures are retried.
pub const GRAPH_OPERATION_MAX_ATTEMPTS: u32 = 3;

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size for entity backfill queries. Fixed per job; a contract between
/// the batch driver and the graph store, not renegotiated mid-stream.
pub const EMBED_PAGE_LIMIT: usize = 100;

// =============================================================================
// RESEARCH
// =============================================================================

/// Maximum number of ranked web search results analyzed per research job.
/// Caps external API cost and latency; completeness is traded away.
pub const MAX_WEB_SEARCH_RESULTS: usize = 3;

// =============================================================================
// EMBEDDING BACKEND
// =============================================================================

/// Default Ollama endpoint for the HTTP embedding backend.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model name.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for a single embedding HTTP request (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// RUNNER
// =============================================================================

/// Capacity of the job runner's broadcast event channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Maximum number of concurrently running jobs per runner.
pub const JOB_MAX_CONCURRENT: usize = 4;
