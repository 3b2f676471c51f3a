//! Error types for oa-harvest
//!
//! Errors fall into three tiers:
//! - Run-level errors ([`Error`]) stop a harvest before any work starts
//!   (missing input, bad sample bounds, unusable configuration) or signal
//!   infrastructure failures (state store, I/O).
//! - Attempt-level errors ([`FetchError`]) are produced by a single
//!   strategy/URL attempt. They are logged and trigger the next candidate;
//!   they never escape a single entry's processing.
//! - Entry-level failures are not errors at all: they are persisted as
//!   [`FailureRecord`](crate::types::FailureRecord)s with a
//!   [`ResultCode`](crate::types::ResultCode).

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ResultCode;

/// Result type alias for oa-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for oa-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Input metadata dump does not exist
    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Sample size is not strictly between zero and the population size
    #[error("invalid sample: size {sample_size} must satisfy 0 < size < {total}")]
    SampleRange {
        /// Requested sample size
        sample_size: usize,
        /// Number of entries in the stream
        total: usize,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// State store operation failed
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob store (upload/list/download) failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// State store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open one of the stores
    #[error("failed to open store: {0}")]
    ConnectionFailed(String),

    /// Failed to create the key-value schema
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query or transaction failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded
    #[error("corrupt value for key {key} in {store}: {reason}")]
    Corrupt {
        /// Store name (`entries`, `doi`, `fail`)
        store: &'static str,
        /// Offending key
        key: String,
        /// Decoder message
        reason: String,
    },
}

/// Failure of a single download attempt (one strategy against one URL)
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response, connection failure or collaborator rejection
    #[error("request to {url} failed: {reason}")]
    RequestFailure {
        /// URL (or DOI for publisher APIs) that was attempted
        url: String,
        /// HTTP status if a response was received
        status: Option<u16>,
        /// Human-readable reason
        reason: String,
    },

    /// Response body is not the expected document type
    #[error("invalid content from {url}: {reason}")]
    InvalidContent {
        /// URL whose response was rejected
        url: String,
        /// Why the content was rejected
        reason: String,
    },

    /// The attempt exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Local file handling failed while writing the download
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Build a [`FetchError::RequestFailure`] from a reqwest error.
    pub fn from_reqwest(url: &str, e: &reqwest::Error) -> Self {
        let reason = if e.is_timeout() {
            "timeout".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        FetchError::RequestFailure {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            reason,
        }
    }

    /// Persisted result code for this failure when it is the last one seen for an entry.
    pub fn result_code(&self) -> ResultCode {
        match self {
            FetchError::RequestFailure {
                status: Some(code), ..
            } => ResultCode::Http(*code),
            FetchError::RequestFailure { status: None, .. } => ResultCode::RequestFailure,
            FetchError::InvalidContent { .. } => ResultCode::InvalidContent,
            FetchError::Timeout(_) => ResultCode::Timeout,
            FetchError::Io(_) => ResultCode::IoError,
        }
    }
}
