//! Separation error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while initialising or running a separation backend
#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model download failed: {0}")]
    ModelDownloadFailed(String),

    #[error("Backend initialization failed: {0}")]
    BackendInitFailed(String),

    #[error("Separation failed: {0}")]
    SeparationFailed(String),

    #[error("Backend returned {actual} frames for a {expected}-frame chunk")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("No separation model could be loaded:\n{0}")]
    NoModelAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SeparationError>;
