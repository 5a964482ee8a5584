//! Domain-level error taxonomy for vxm-infer.

/// Inference errors.
///
/// `Configuration` and `DataConsistency` are setup mistakes and are never
/// retried. A failed snapshot write and a failed sink delivery are not
/// errors at all: the first is logged as a warning, the second at debug.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data consistency error for subject {subject}: {reason}")]
    DataConsistency { subject: String, reason: String },

    #[error("registration of subject {subject} failed: {reason}")]
    Registration { subject: String, reason: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a registration error for a subject.
    pub fn registration(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registration {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a data consistency error for a subject.
    pub fn data_consistency(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataConsistency {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
