//! Error types for imara-core

use thiserror::Error;

use crate::protocol::DecodeError;
use crate::types::SessionStatus;

/// Main error type for the imara-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Query rejected before any connection was opened
    #[error("validation error: {0}")]
    Validation(String),

    /// A session is already connecting or active
    #[error("a research session is already {status}")]
    SessionBusy { status: SessionStatus },

    /// Operation requires a completed session
    #[error("session is {status}, expected completed")]
    NotCompleted { status: SessionStatus },

    /// Streaming connection could not be opened or dropped unexpectedly
    #[error("transport failure: {0}")]
    Transport(String),

    /// Inbound frame could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// Backend reported an error event
    #[error("backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// REST API error
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for imara-core
pub type Result<T> = std::result::Result<T, Error>;
