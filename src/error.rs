//! Error types for record-export
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Config, Api, Attachment, etc.)
//! - Transparent conversions from transport, I/O and serialization errors
//! - Context information (config key, file path, attachment directory)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for record-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for record-export
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues. Every error is
/// fatal to the export run that produced it; the pipeline never retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "encoding")
        key: Option<String>,
    },

    /// Network or transport error while talking to the record service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The record service rejected a request
    #[error("service error (HTTP {status}): {code}: {message}")]
    Api {
        /// HTTP status returned by the service
        status: u16,
        /// Machine-readable error code from the service response body
        code: String,
        /// Human-readable message from the service response body
        message: String,
    },

    /// The service returned a payload the decoder does not understand
    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    /// Attachment download or local write failed
    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    /// Invalid base URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error on the output sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Attachment-related errors
///
/// Raised by the filesystem attachment sink. All of these abort the export
/// run; a partially written attachment tree is not cleaned up.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Could not create the per-field attachment directory
    #[error("failed to create attachment directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Could not write a downloaded file to disk
    #[error("failed to write attachment {path}: {source}")]
    WriteFile {
        /// Local path being written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The remote byte stream failed mid-copy
    #[error("failed to read attachment stream for file key {file_key}: {source}")]
    ReadStream {
        /// File key being downloaded
        file_key: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
