//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Files are stored in a configured directory and accessed using standard filesystem
//! operations via `tokio::fs` for async I/O.

use crate::backend::ByteStream;
use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Local filesystem storage backend.
///
/// Stores files in a directory on the local filesystem. Every file name is
/// resolved directly below the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use vendr_storage::backend::LocalBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("cache", "/project/node_modules/.remote-scripts")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the cache
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating the root directory if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once per build session
            // and it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// The absolute directory this backend stores files in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates a cache file name and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn write_stream(&self, path: &Path, stream: ByteStream) -> Result<u64> {
        let abs_path = self.absolute_path(path)?;
        let mut file = fs::File::create(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut reader = StreamReader::new(stream);
        // Stream errors come back out of `copy` as-is; don't remap them by
        // kind or the producer's error gets lost.
        let written = tokio::io::copy(&mut reader, &mut file).await.map_err(ErrorKind::Io)?;
        file.flush().await.map_err(ErrorKind::Io)?;
        tracing::trace!(path = %path.display(), bytes = written, "Stream persisted to cache");
        Ok(written)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        Ok(fs::rename(&from_path, &to_path).await.map_err(|e| Self::map_io_error(e, to))?)
    }

    async fn empty(&self) -> Result<u64> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| Self::map_io_error(e, &self.root))?;
        let mut removed: u64 = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &self.root))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?;
            if file_type.is_dir() {
                fs::remove_dir_all(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
            } else {
                fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
            }
            removed += 1;
        }
        tracing::debug!(root = %self.root.display(), removed, "Emptied cache directory");
        Ok(removed)
    }
}
