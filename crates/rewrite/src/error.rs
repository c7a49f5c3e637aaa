//! Rewrite Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failed downloads keep the fetch
//! error as a child, so the underlying transport or disk failure is still
//! visible when the error tree is printed.

use derive_more::{Display, Error};

/// A rewrite error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rewrite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A remote resource the document depends on could not be vendored.
    #[display("could not vendor {_0}")]
    Download(#[error(not(source))] String),
    /// The cache directory could not be prepared or queried.
    #[display("asset cache unavailable")]
    Storage,
    /// A document or cache path cannot be expressed relative to another.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The resource kinds or match attribute don't form a valid selector.
    #[display("invalid element selector: {_0}")]
    Selector(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download(_) | Self::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::Download("https://cdn.example.com/a.js".to_string()).to_string(),
            "could not vendor https://cdn.example.com/a.js"
        );
        assert_eq!(ErrorKind::Selector("script[]".to_string()).to_string(), "invalid element selector: script[]");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Download("https://cdn.example.com/a.js".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidPath("a".to_string()).is_retryable());
    }
}
