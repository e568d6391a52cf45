//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::session::CaptureError;
use crate::capture::transport::TransportError;
use crate::planning::types::PlanError;
use crate::project::bundle::BundleError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),
}

impl AppError {
    /// Short machine-readable code, printed by the binary next to the error message
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Plan(_) => "PLAN_ERROR",
            AppError::Bundle(_) => "BUNDLE_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
