//! Error types for GXP

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure taxonomy for the ingestion pipeline.
///
/// Components never retry locally; these propagate to the job queue,
/// which records the job as failed with the error as its result.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A remote read or query failed before any data was obtained.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A row or document could not be decoded into its typed record.
    #[error("malformed input: {0}")]
    Decode(String),

    /// A bulk insert was rejected by the store (e.g. duplicate key).
    #[error("bulk insert failed: {0}")]
    Insert(String),

    /// The store became unreachable mid-job.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// A prerequisite dataset is missing; reported, not a crash.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl IngestError {
    /// Stable machine-readable kind, used in job result payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::SourceUnavailable(_) => "source_unavailable",
            IngestError::Decode(_) => "decode_error",
            IngestError::Insert(_) => "insert_error",
            IngestError::Connection(_) => "connection_error",
            IngestError::PreconditionFailed(_) => "precondition_failed",
        }
    }

    /// Structured result payload recorded on the failed job.
    pub fn to_result_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            IngestError::SourceUnavailable("s3".into()).kind(),
            "source_unavailable"
        );
        assert_eq!(IngestError::Decode("row 3".into()).kind(), "decode_error");
        assert_eq!(IngestError::Insert("dup".into()).kind(), "insert_error");
        assert_eq!(
            IngestError::Connection("reset".into()).kind(),
            "connection_error"
        );
        assert_eq!(
            IngestError::PreconditionFailed("no studies".into()).kind(),
            "precondition_failed"
        );
    }

    #[test]
    fn test_result_payload_carries_diagnostic() {
        let payload = IngestError::PreconditionFailed(
            "no studies with external ids; ingest study metadata first".into(),
        )
        .to_result_payload();

        assert_eq!(payload["error"], "precondition_failed");
        let message = payload["message"].as_str().unwrap();
        assert!(message.contains("ingest study metadata first"));
        // Human-readable diagnostics only, never a stack trace.
        assert!(!message.contains("backtrace"));
    }
}
