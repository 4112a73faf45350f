//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// ClickHouse error.
    #[error("ClickHouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    /// HTTP client error (upstream stream or downstream forward).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream source error (protocol violation, unexpected close).
    #[error("Source error: {0}")]
    Source(String),

    /// Downstream sink rejected a batch (non-2xx response).
    #[error("Sink rejected batch: {0}")]
    SinkRejected(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<chirp_core::Error> for Error {
    fn from(e: chirp_core::Error) -> Self {
        match e {
            chirp_core::Error::Json(e) => Error::Json(e),
            chirp_core::Error::Io(e) => Error::Io(e),
        }
    }
}
