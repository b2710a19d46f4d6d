use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Failure of a single HTTP call. Never surfaced to the request caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("parse error: {0}")]
    Parse(String),
}
