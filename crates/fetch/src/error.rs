//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! A single download is shared by every caller that asked for the same cache
//! file, so the outcome of that download has to be handed out more than once.
//! [`ErrorKind`] is therefore `Clone`, and every joined caller raises its own
//! [`Error`] from a copy of the kind the download settled with.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be made, or the body stopped arriving midway.
    #[display("failed to fetch {url}: {reason}")]
    Transport {
        url: String,
        reason: String,
    },
    /// The server answered, but not with a success status.
    #[display("failed to fetch {url}: server responded with HTTP {status}")]
    Status {
        url: String,
        status: u16,
    },
    /// The body could not be persisted to the cache.
    #[display("failed to write {}: {reason}", path.display())]
    Write {
        path: PathBuf,
        reason: String,
    },
    /// The cache could not be queried.
    #[display("cache storage error: {_0}")]
    Storage(#[error(not(source))] String),
    /// The download task went away without reporting back (panicked).
    #[display("download task aborted: {_0}")]
    Aborted(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("invalid transport configuration: {_0}")]
    Client(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Write { .. } | Self::Storage(_) | Self::Aborted(_) => true,
            // 4xx won't fix itself, 5xx might.
            Self::Status { status, .. } => *status >= 500,
            Self::Client(_) => false,
        }
    }
}
