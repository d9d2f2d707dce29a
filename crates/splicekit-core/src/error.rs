//! SpliceKit Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::{ClipId, TrackId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Timeline Errors
    // =========================================================================
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Track is locked: {0}")]
    TrackLocked(TrackId),

    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    // =========================================================================
    // Command Errors
    // =========================================================================
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // =========================================================================
    // Task Errors
    // =========================================================================
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;
