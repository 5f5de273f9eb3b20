//! Structured logging field name constants for lattice.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (job start/finish), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (pages, embeddings) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name, as passed to the operation invoker.
pub const OPERATION: &str = "op";

// ─── Job fields ────────────────────────────────────────────────────────────

/// Job instance UUID.
pub const JOB_ID: &str = "job_id";

/// Registered job name ("update_entity_embeddings", "research_task", ...).
pub const JOB_NAME: &str = "job_name";

/// Account id a job's graph operations are authorized as.
pub const ACTOR_ID: &str = "actor_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Attempt number within an operation call's retry budget (1-based).
pub const ATTEMPT: &str = "attempt";

/// Number of pages streamed by the cursor batch driver.
pub const PAGE_COUNT: &str = "page_count";

/// Number of items processed.
pub const ITEM_COUNT: &str = "item_count";

/// Total tokens folded into a job's usage counter.
pub const TOTAL_TOKENS: &str = "total_tokens";
