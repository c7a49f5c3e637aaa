//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the handful of filesystem operations the asset cache needs:
//! existence checks, streaming writes, deletion, atomic renames and wiping
//! the whole cache.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;

/// A stream of body chunks, as produced by an HTTP response.
///
/// Errors are plain [`std::io::Error`]s so that producers can smuggle their
/// own error type through [`std::io::Error::other`] and consumers can
/// recover it with [`get_ref`](std::io::Error::get_ref).
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous so that concurrent transforms
/// never block each other on disk I/O. It's a glorified CRUD interface, but
/// in ✨Rust✨
///
/// # Path Handling
/// Every path is a cache file name directly below the storage root and must
/// be validated using [`validate_path`](crate::validate_path) before use.
/// Implementations should enforce this validation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend (used for logging only).
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Stream chunks into a file without buffering the whole body in memory.
    ///
    /// Returns the number of bytes written. If the stream yields an error the
    /// write stops and the error is returned as
    /// [`Io`](crate::error::ErrorKind::Io), untouched, so that the producer's
    /// error can be recovered. Whatever was written before the failure is
    /// left behind; cleaning up is the caller's responsibility.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bytes::Bytes;
    /// use std::path::Path;
    /// # use vendr_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let chunks: Vec<std::io::Result<Bytes>> = vec![Ok(Bytes::from_static(b"console.log(")), Ok(Bytes::from_static(b"1)"))];
    /// let written = backend.write_stream(Path::new("a.js"), Box::pin(futures::stream::iter(chunks))).await?;
    /// assert_eq!(written, 14);
    /// # Ok(())
    /// # }
    /// ```
    async fn write_stream(&self, path: &Path, stream: ByteStream) -> Result<u64>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    ///
    /// # Notes
    /// - If the destination already exists, it will be overwritten
    /// - The destination must never be observable half-written
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove everything below the storage root, keeping the root itself.
    ///
    /// Returns the number of top-level entries removed.
    async fn empty(&self) -> Result<u64>;
}
