use thiserror::Error;

/// Hard failures of the alignment engine. Soft conditions never surface
/// here; they are reported as warnings on the result instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid anchor category '{0}'")]
    InvalidCategory(String),

    #[error("Anchor {0} not found")]
    AnchorNotFound(u32),

    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("{0} is empty")]
    EmptyMatrix(String),

    #[error("{0} is empty")]
    EmptyVector(String),

    #[error("Matrix row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed KV-cache: {0}")]
    MalformedKvCache(String),

    #[error("Malformed W-Matrix: {0}")]
    MalformedWMatrix(String),

    #[error("Invalid anchor dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error(
        "Alignment does not meet {threshold_pct}% semantic fidelity threshold (score {score:.4}, nearest anchor: {nearest})"
    )]
    BelowThreshold {
        score: f64,
        threshold_pct: u32,
        nearest: String,
    },
}
