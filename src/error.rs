//! Error types for the pointer control engine.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark detection service failed
    #[error("Detection error: {0}")]
    Detection(String),

    /// Pose-recovery solve was numerically degenerate
    #[error("Pose solve error: {0}")]
    PoseSolve(String),

    /// Cursor control or input injection failed
    #[error("Cursor control error: {0}")]
    CursorControl(String),

    /// Calibration data quality was insufficient
    #[error("Calibration quality error: {0}")]
    CalibrationQuality(String),

    /// Calibration was cancelled before completion
    #[error("Calibration cancelled")]
    CalibrationCancelled,
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
