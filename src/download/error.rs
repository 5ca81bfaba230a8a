//! Error types for the download module.
//!
//! This module defines structured errors for byte transfer,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a file's bytes.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A request header could not be encoded.
    #[error("invalid header `{name}` for {url}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// The request URL.
        url: String,
    },

    /// Digest of the received bytes differs from the hoster-reported checksum.
    #[error("{algorithm} checksum mismatch for {path}: expected {expected}, got {actual}\n  Suggestion: The download was corrupted; try again")]
    ChecksumMismatch {
        /// Removed download path.
        path: PathBuf,
        /// Algorithm name.
        algorithm: &'static str,
        /// Expected digest (hex).
        expected: String,
        /// Computed digest (hex).
        actual: String,
    },

    /// Received byte count differs from the hoster-reported size.
    #[error("size mismatch for {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    SizeMismatch {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, folding timeouts into [`Self::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures that might succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::ChecksumMismatch { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Io { .. } | Self::InvalidHeader { .. } | Self::SizeMismatch { .. } => false,
        }
    }
}
