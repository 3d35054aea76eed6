//! Batch engine error types

use thiserror::Error;

/// Result type alias for batch operations
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Failures raised while triggering, running or archiving a file run
#[derive(Error, Debug)]
pub enum BatchError {
    /// The input could not be opened; the run aborts before any chunk
    #[error("Source unavailable: {identity}: {reason}")]
    SourceUnavailable { identity: String, reason: String },

    #[error("Line {line}: cannot decode '{input}': {reason}")]
    RecordDecode {
        line: u64,
        input: String,
        reason: String,
    },

    #[error("Line {line}: record rejected: {reason}")]
    RecordValidation { line: u64, reason: String },

    /// The record store refused a chunk; nothing of that chunk is persisted
    #[error("Sink failure on chunk {chunk}: {reason}")]
    SinkFailure { chunk: u64, reason: String },

    #[error("Relocation of {identity} failed: {reason}")]
    RelocationFailure { identity: String, reason: String },

    #[error("Trigger error: {0}")]
    Trigger(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] ferry_common::FerryError),
}

impl BatchError {
    /// Decode and validation failures are handed to the skip policy;
    /// everything else aborts the run outright.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            BatchError::RecordDecode { .. } | BatchError::RecordValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_classification() {
        let decode = BatchError::RecordDecode {
            line: 3,
            input: "nodelim".to_string(),
            reason: "expected 2 fields".to_string(),
        };
        let validation = BatchError::RecordValidation {
            line: 1,
            reason: "name too long".to_string(),
        };
        let sink = BatchError::SinkFailure {
            chunk: 2,
            reason: "connection reset".to_string(),
        };

        assert!(decode.is_record_level());
        assert!(validation.is_record_level());
        assert!(!sink.is_record_level());
        assert!(!BatchError::Trigger("busy".to_string()).is_record_level());
    }

    #[test]
    fn test_display_carries_line_number() {
        let err = BatchError::RecordValidation {
            line: 7,
            reason: "name too long".to_string(),
        };
        assert_eq!(err.to_string(), "Line 7: record rejected: name too long");
    }
}
