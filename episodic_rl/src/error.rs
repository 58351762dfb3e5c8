//! Error taxonomy for the experiment harness.
//!
//! Configuration and space errors are raised before any environment or agent
//! is built and abort the run. Readiness errors are expected during warm-up
//! and are avoided by checking [`ReplayBuffer::ready`](crate::buffers::ReplayBuffer::ready)
//! before sampling.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RlError>;

/// Errors produced by the harness.
#[derive(Debug, Error)]
pub enum RlError {
    /// Every violation found while validating a configuration.
    #[error("configuration invalid ({} violation(s)): {}", .0.len(), .0.join("; "))]
    ConfigValidation(Vec<String>),

    /// The agent cannot map the environment's observation or action space.
    #[error("unsupported space: {0}")]
    UnsupportedSpace(String),

    /// Sampling asked for more data than is available or allowed.
    #[error(
        "insufficient data: requested {requested}, available {available} (min ready {min_ready})"
    )]
    InsufficientData {
        requested: usize,
        available: usize,
        min_ready: usize,
    },

    /// No completed episode has been recorded yet.
    #[error("episode buffer holds no completed episodes")]
    EmptyBuffer,

    /// The checkpoint does not belong to the current agent variant or format.
    #[error("incompatible checkpoint: {0}")]
    CheckpointIncompatible(String),

    /// A sample did not match the dimensionality of the statistic or layer.
    #[error("shape mismatch: expected {expected} element(s), got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The environment factory does not know the requested id.
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    /// An action of the wrong kind was passed to an environment.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// An agent received a batch it cannot learn from.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Burn record (de)serialization failure.
    #[error("recorder error: {0}")]
    Recorder(String),
}

impl RlError {
    /// Shorthand for a single-violation configuration error.
    pub fn config(violation: impl Into<String>) -> Self {
        RlError::ConfigValidation(vec![violation.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation_lists_every_violation() {
        let err = RlError::ConfigValidation(vec![
            "unknown transform 'blur'".to_string(),
            "frame_stack.num_frames must be >= 1".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 violation(s)"));
        assert!(msg.contains("blur"));
        assert!(msg.contains("num_frames"));
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = RlError::InsufficientData {
            requested: 8,
            available: 3,
            min_ready: 4,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: requested 8, available 3 (min ready 4)"
        );
    }
}
