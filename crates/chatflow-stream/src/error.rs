//! Error types for the streaming pipeline.

use thiserror::Error;

/// Streaming pipeline error types.
///
/// Explicit cancellation is not represented here: it is a distinct
/// terminal outcome, not a failure.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Backend-reported failure delivered in-band as an `{error}` event.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The submission endpoint answered with a non-success status.
    #[error("message submission failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for streaming operations.
pub type Result<T> = std::result::Result<T, StreamError>;
