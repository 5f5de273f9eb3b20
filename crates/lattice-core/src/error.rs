//! Error types for lattice.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using lattice's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lattice operations.
///
/// Remote operation failures, timeouts, cancellation, and precondition
/// failures are distinct variants so job definitions can react to each
/// without string matching.
#[derive(Error, Debug)]
pub enum Error {
    /// The graph store reported a domain failure (no such object, malformed
    /// schema, rejected write).
    #[error("Graph error: {0}")]
    Graph(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Entity inference failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Web search or text extraction failed
    #[error("Search error: {0}")]
    Search(String),

    /// An operation call exceeded its configured timeout. Distinct from a
    /// remote-reported error; retried only if the call's policy allows.
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation name as passed to the invoker.
        operation: String,
        /// The configured per-call timeout that elapsed.
        timeout: Duration,
    },

    /// The job was cancelled by an external signal. Not an error in the
    /// retry sense; never retried. Partial results, if any, are available
    /// through the job registry.
    #[error("Job cancelled")]
    Cancelled,

    /// A job precondition was not met (e.g., no AI actor available).
    /// Fatal for the job instance, surfaced immediately.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Job orchestration error (unknown job name, registry misuse)
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a failed operation call may be re-attempted under its policy.
    ///
    /// Cancellation and precondition failures are terminal regardless of the
    /// configured attempt budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::Precondition(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_graph() {
        let err = Error::Graph("entity type not found".to_string());
        assert_eq!(err.to_string(), "Graph error: entity type not found");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout {
            operation: "create_entity_embeddings".to_string(),
            timeout: Duration::from_secs(3600),
        };
        assert!(err.to_string().contains("create_entity_embeddings"));
        assert!(err.to_string().contains("3600"));
    }

    #[test]
    fn test_error_display_cancelled() {
        assert_eq!(Error::Cancelled.to_string(), "Job cancelled");
    }

    #[test]
    fn test_error_display_precondition() {
        let err = Error::Precondition("AI assistant account not found".to_string());
        assert_eq!(
            err.to_string(),
            "Precondition failed: AI assistant account not found"
        );
    }

    #[test]
    fn test_cancelled_not_retryable() {
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_precondition_not_retryable() {
        assert!(!Error::Precondition("no actor".into()).is_retryable());
    }

    #[test]
    fn test_timeout_retryable() {
        let err = Error::Timeout {
            operation: "get_entities".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_remote_error_retryable() {
        assert!(Error::Graph("transient".into()).is_retryable());
        assert!(Error::Request("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
