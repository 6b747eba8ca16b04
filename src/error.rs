//! Error types for qcapsnets

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Quantization scheme not implemented: {0}")]
    UnknownScheme(String),

    #[error(
        "The memory budget can not be satisfied ({budget_bits} bits), increase it to {:.6} MB at least",
        bits_to_mb(.required_bits)
    )]
    MemoryBudgetInfeasible { budget_bits: u64, required_bits: u64 },

    #[error("Missing statistics: {0}")]
    MissingStatistics(String),

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    Alignment {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Accuracy evaluation failed: {0}")]
    Evaluation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn bits_to_mb(bits: &u64) -> f64 {
    *bits as f64 / 8.0 / (1u64 << 20) as f64
}
