//! Error types for the amr-network library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid binary value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),

    #[error("Strain ID mismatch: {0}")]
    StrainMismatch(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(
        "Search space too large: {candidates} itemsets at level {level} exceed the limit of {limit}"
    )]
    SearchSpaceTooLarge {
        level: usize,
        candidates: usize,
        limit: usize,
    },

    #[error(
        "Rule search space too large: {candidates} candidate rules exceed the limit of {limit}"
    )]
    RuleSpaceTooLarge { candidates: usize, limit: usize },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Whether this error was raised by configuration validation rather than
    /// by a computation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
