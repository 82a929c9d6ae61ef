//! Error types for microcam.
//!
//! This module defines all error types used throughout the microcam crate.
//! Only a handful of them are ever visible to HTTP callers; the server module
//! decides how each one maps to a status code.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for microcam operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    /// The upload carried no file payload (missing field or zero bytes).
    #[error("no file")]
    InvalidRequest,

    /// The upload body exceeded the configured size limit.
    #[error("upload too large")]
    PayloadTooLarge,

    // === Storage Errors ===
    /// Writing a frame to the storage directory failed.
    #[error("failed to write frame to {path}: {source}")]
    StorageWrite {
        /// Path that could not be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The requested frame does not exist (for example, no upload has
    /// succeeded yet, so there is no latest pointer).
    #[error("frame not found: {path}")]
    FrameNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Reading a frame from the storage directory failed.
    #[error("failed to read frame from {path}: {source}")]
    StorageRead {
        /// Path that could not be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A config file that was asked for explicitly does not exist.
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Server Errors ===
    /// The HTTP server failed to bind or stopped unexpectedly.
    #[error("server error: {0}")]
    Server(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for microcam operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new server error.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a frame-not-found error for the given path.
    #[must_use]
    pub fn frame_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FrameNotFound { path: path.into() }
    }

    /// Check if this error means the requested frame does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FrameNotFound { .. })
    }

    /// Check if this error was caused by the caller rather than the service.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::PayloadTooLarge | Self::FrameNotFound { .. }
        )
    }
}
