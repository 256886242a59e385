//! Error types for lap ingestion and telemetry decoding.
//!
//! All errors implement the `std::error::Error` trait and include structured context
//! for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Database Errors**: connectivity or query failures against the lap store
//! - **Decode Errors**: malformed or truncated binary telemetry packets
//! - **Config Errors**: invalid watch paths or unreadable configuration files
//! - **Payload Errors**: ingestion payloads that are not valid JSON
//! - **File / Watch Errors**: filesystem and directory-watcher failures
//!
//! Validation problems inside a payload (a session without a track, a lap without a
//! time) are *not* errors. The normalizer skips them and reports them in
//! [`crate::IngestReport`].
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use apex_laps::IngestError;
//!
//! let error = IngestError::decode_error(16, 7);
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Main error type for ingestion, storage and decoding.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error("Database error during {operation}")]
    Database {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Malformed telemetry packet: expected at least {expected} bytes, got {actual}")]
    Decode { expected: usize, actual: usize },

    #[error("Invalid hex telemetry payload: {details}")]
    InvalidHex { details: String },

    #[error("Invalid configuration for {}: {reason}", path.display())]
    Config { reason: String, path: PathBuf },

    #[error("Invalid payload in {context}: {details}")]
    Payload { context: String, details: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("File error: {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Telemetry socket error on {address}")]
    Socket {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory watcher error: {reason}")]
    Watch {
        reason: String,
        #[source]
        source: notify::Error,
    },

    #[error("Background task failed: {reason}")]
    Task { reason: String },
}

impl IngestError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Database { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            IngestError::Decode { .. } => false,
            IngestError::InvalidHex { .. } => false,
            IngestError::Config { .. } => false,
            IngestError::Payload { .. } => false,
            IngestError::InvalidRequest { .. } => false,
            IngestError::File { .. } => true,
            IngestError::Socket { .. } => true,
            IngestError::Watch { .. } => true,
            IngestError::Task { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            IngestError::Database { .. } => vec![
                "Check the database file is reachable and writable",
                "Retry the upload; already committed sessions are kept",
                "Verify no other process holds an exclusive lock",
            ],
            IngestError::Decode { .. } => vec![
                "Check the sender emits full 16-byte telemetry packets",
                "Verify the relay is not truncating datagrams",
            ],
            IngestError::InvalidHex { .. } => vec![
                "Send the packet bytes as an even-length hex string",
                "Strip whitespace and prefixes such as 0x from the payload",
            ],
            IngestError::Config { .. } => vec![
                "Check the folder exists and is a directory",
                "Use an absolute path to avoid working-directory surprises",
            ],
            IngestError::Payload { .. } => vec![
                "Check the upload is valid JSON",
                "Verify the exporter wrote the file completely",
            ],
            IngestError::InvalidRequest { .. } => vec![
                "Include both a relay id and a payload in the request",
            ],
            IngestError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            IngestError::Socket { .. } => vec![
                "Check no other process is bound to the telemetry port",
                "Choose a different telemetry port in the service configuration",
            ],
            IngestError::Watch { .. } => vec![
                "Check the operating system watch limits",
                "Set the watch path again to restart the watcher",
            ],
            IngestError::Task { .. } => vec![
                "Retry the operation",
                "Check the logs for a panic in the ingestion task",
            ],
        }
    }

    /// Helper constructor for database errors with operation context.
    pub fn database(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        IngestError::Database { operation: operation.into(), source }
    }

    /// Helper constructor for short telemetry buffers.
    pub fn decode_error(expected: usize, actual: usize) -> Self {
        IngestError::Decode { expected, actual }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        IngestError::Config { reason: reason.into(), path: path.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::File { path: path.into(), source }
    }

    /// Helper constructor for payload errors.
    pub fn payload_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        IngestError::Payload { context: context.into(), details: details.into() }
    }

    /// Helper constructor for rejected requests.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        IngestError::InvalidRequest { reason: reason.into() }
    }

    /// Helper constructor for telemetry socket errors.
    pub fn socket_error(address: std::net::SocketAddr, source: std::io::Error) -> Self {
        IngestError::Socket { address, source }
    }

    /// Helper constructor for watcher errors.
    pub fn watch_error(reason: impl Into<String>, source: notify::Error) -> Self {
        IngestError::Watch { reason: reason.into(), source }
    }
}

impl From<hex::FromHexError> for IngestError {
    fn from(err: hex::FromHexError) -> Self {
        IngestError::InvalidHex { details: err.to_string() }
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Task { reason: err.to_string() }
    }
}
