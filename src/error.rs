use thiserror::Error;

/// Fatal error taxonomy for the fitting pipeline.
///
/// Configuration and data problems abort the run before any window is
/// optimized. Optimizer non-convergence is deliberately not represented
/// here: affected windows keep their best-found parameters and the event
/// is logged instead.
#[derive(Error, Debug)]
pub enum FitError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input data: {0}")]
    Data(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for fitting operations
pub type FitResult<T> = Result<T, FitError>;
