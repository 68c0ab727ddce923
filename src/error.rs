//! Error types for the spamlens engine

use thiserror::Error;

/// Result type alias for spamlens operations
pub type Result<T> = std::result::Result<T, SpamLensError>;

/// Main error type for the spamlens engine
#[derive(Error, Debug)]
pub enum SpamLensError {
    #[error("Vectorizer error: {0}")]
    VectorizerError(String),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Classifier '{classifier}' failed: {reason}")]
    ClassifierError { classifier: String, reason: String },

    #[error("Classifier '{classifier}' does not expose {capability}")]
    MissingCapability {
        classifier: String,
        capability: &'static str,
    },

    #[error("No classifier available: {0}")]
    ClassifierUnavailable(String),

    #[error("Calibration error: {0}")]
    CalibrationError(String),

    #[error("Explanation error: {0}")]
    ExplanationError(String),

    #[error("Message has no tokens to explain")]
    EmptyMessage,

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Sampling budget exhausted after {completed} samples (need {required})")]
    BudgetExceeded { completed: usize, required: usize },

    #[error("Insufficient samples: {completed} completed, {required} required")]
    InsufficientSamples { completed: usize, required: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SpamLensError {
    fn from(err: serde_json::Error) -> Self {
        SpamLensError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SpamLensError {
    fn from(err: ndarray::ShapeError) -> Self {
        SpamLensError::NumericalError(err.to_string())
    }
}
