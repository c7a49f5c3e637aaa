//! In-memory storage backend for testing.

use crate::backend::ByteStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::StorageBackend;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need a [`StorageBackend`] without filesystem dependencies.
///
/// # Examples
///
/// ```
/// use vendr_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("remote-script.0123456789abcdef.js", b"console.log(1)"),
/// ]);
/// assert!(backend.exists(Path::new("remote-script.0123456789abcdef.js")).await?);
/// assert_eq!(backend.read(Path::new("remote-script.0123456789abcdef.js")).await?, b"console.log(1)");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
    failing_writes: bool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing_writes: false,
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every streamed write and rename fail, as a full disk would.
    pub fn with_failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    /// Paths of every stored file, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.storage.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Contents of a stored file, so tests can inspect what was written.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let data = self.storage.read().await.get(&path).cloned();
        data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.failing_writes {
            exn::bail!(ErrorKind::BackendError(format!("writes disabled: {}", path.display())));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn write_stream(&self, path: &Path, mut stream: ByteStream) -> Result<u64> {
        let path = validate_path(path)?;
        self.check_writable(&path)?;
        let mut data = Vec::new();
        let outcome = loop {
            match stream.try_next().await {
                Ok(Some(chunk)) => data.extend_from_slice(&chunk),
                Ok(None) => break Ok(data.len() as u64),
                Err(e) => break Err(exn::Exn::from(ErrorKind::Io(e))),
            }
        };
        // Partial writes stay behind, same as a real file would.
        self.storage.write().await.insert(path, data);
        outcome
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        self.check_writable(&to)?;
        let mut guard = self.storage.write().await;
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn empty(&self) -> Result<u64> {
        let mut guard = self.storage.write().await;
        let removed = guard.len() as u64;
        guard.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const SCRIPT: &str = "remote-script.0123456789abcdef.js";
    const STYLE: &str = "remote-script.fedcba9876543210.css";

    fn body(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<std::io::Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_with_files() {
        let backend = MockBackend::with_files([(SCRIPT, Vec::from(*b"script")), (STYLE, Vec::from(*b"style"))]);
        assert!(backend.exists(Path::new(SCRIPT)).await.unwrap());
        assert!(backend.exists(Path::new(&format!("./{STYLE}"))).await.unwrap());
        assert!(!backend.exists(Path::new("remote-script.0000000000000000.js")).await.unwrap());
        assert_eq!(backend.paths().await, vec![PathBuf::from(SCRIPT), PathBuf::from(STYLE)]);
    }

    #[tokio::test]
    async fn test_write_stream() {
        let backend = MockBackend::default();
        let written = backend.write_stream(Path::new(SCRIPT), body(&[b"console", b".log(1)"])).await.unwrap();
        assert_eq!(written, 14);
        assert_eq!(backend.read(Path::new(SCRIPT)).await.unwrap(), b"console.log(1)");
    }

    #[tokio::test]
    async fn test_write_stream_keeps_partial_data() {
        let backend = MockBackend::default();
        let items: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"half")), Err(std::io::Error::other("connection reset"))];
        let err = backend.write_stream(Path::new(SCRIPT), Box::pin(futures::stream::iter(items))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert_eq!(backend.read(Path::new(SCRIPT)).await.unwrap(), b"half");
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let backend = MockBackend::with_files([(SCRIPT, Vec::from(*b"script"))]).with_failing_writes();
        let err = backend.write_stream(Path::new(STYLE), body(&[b"body{}"])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(!backend.exists(Path::new(STYLE)).await.unwrap());
        let err = backend.rename(Path::new(SCRIPT), Path::new(STYLE)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new(SCRIPT)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::with_files([(SCRIPT, Vec::from(*b"script"))]);
        backend.delete(Path::new(SCRIPT)).await.unwrap();
        assert!(!backend.exists(Path::new(SCRIPT)).await.unwrap());
        // Deleting a missing file is an error
        let err = backend.delete(Path::new(SCRIPT)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_partial_file() {
        let partial = format!("{SCRIPT}.part");
        let backend = MockBackend::with_files([(partial.as_str(), Vec::from(*b"script"))]);
        backend.rename(Path::new(&partial), Path::new(SCRIPT)).await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from(SCRIPT)]);
        assert_eq!(backend.read(Path::new(SCRIPT)).await.unwrap(), b"script");
    }

    #[tokio::test]
    async fn test_empty() {
        let backend = MockBackend::with_files([(SCRIPT, Vec::from(*b"1")), (STYLE, Vec::from(*b"2"))]);
        assert_eq!(backend.empty().await.unwrap(), 2);
        assert!(backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_nested_names_rejected() {
        let backend = MockBackend::default();
        assert!(backend.exists(Path::new("../escape.js")).await.is_err());
        assert!(backend.write_stream(Path::new("vendor/a.js"), body(&[b"bad"])).await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
