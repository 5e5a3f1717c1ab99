use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A step does not belong to the capability set of the system holding it.
    /// Raised both when the system is built and when it dispatches.
    #[error("{system} cannot hold step {step}: expected {expected}")]
    InvalidStep {
        system: String,
        step: String,
        expected: &'static str,
    },

    #[error("{system} got {weights} weights for {steps} steps")]
    WeightMismatch {
        system: String,
        weights: usize,
        steps: usize,
    },

    #[error("{system} has invalid weights: {reason}")]
    InvalidWeights { system: String, reason: String },

    /// A capability method or combiner hook was never provided.
    #[error("{block} does not implement {method}")]
    NotImplemented { block: String, method: &'static str },

    #[error("Cannot canonicalize state of {block}: {source}")]
    Canonicalization {
        block: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration for {step}: {reason}")]
    InvalidConfig { step: String, reason: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn not_implemented(block: impl Into<String>, method: &'static str) -> Self {
        PipelineError::NotImplemented {
            block: block.into(),
            method,
        }
    }
}
