//! Download coordination.
//!
//! The [`Coordinator`] is the only thing that writes into the cache. It keeps
//! an in-flight registry, keyed by cache path, of downloads that haven't
//! settled yet; every request for a path that is already being downloaded
//! joins the existing download instead of starting another one. The registry
//! is not a cache: an entry lives exactly as long as its download, and the
//! storage backend is the only durable record of what has been fetched.
//!
//! Bodies are streamed into a sibling `.part` file and renamed into place
//! once complete, so a file existing at a cache path always means a complete
//! download.

use crate::error::{Error, ErrorKind, Result};
use crate::transport::{BodyError, Transport, TransportHandle};
use exn::ResultExt;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Instrument;
use vendr_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use vendr_storage::{BackendHandle, StorageBackend, validate_path};

const PARTIAL_SUFFIX: &str = ".part";

type Outcome<T = Fetched> = std::result::Result<T, ErrorKind>;
type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;
type Registry = Arc<Mutex<HashMap<PathBuf, SharedOutcome>>>;

/// How a download settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// The body was streamed into the cache.
    Downloaded { bytes: u64 },
    /// The file was already in the cache; nothing was fetched.
    AlreadyPresent,
}

/// Result of [`Coordinator::ensure`].
#[derive(Debug)]
pub enum Ensured {
    /// The file is in the cache and no download is running for it.
    Cached,
    /// A download is running, started either by this call or an earlier one.
    Pending(Download),
}

/// Handle to an in-flight download.
///
/// Cloning is cheap and every clone resolves to the same outcome. Dropping
/// every handle does not cancel the download; it runs to completion either
/// way.
#[derive(Clone)]
pub struct Download {
    path: PathBuf,
    outcome: SharedOutcome,
}

impl Download {
    /// Cache path being downloaded, relative to the storage root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the download to settle.
    pub async fn wait(self) -> Result<Fetched> {
        self.outcome.await.map_err(Error::from)
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Guarantees at most one download per cache path.
///
/// One coordinator is created per cache directory and lives for the build
/// session; share it (it is `Send + Sync`) rather than creating several over
/// the same directory.
///
/// Starting a download spawns a Tokio task, so [`ensure`](Self::ensure) must
/// be called from within a Tokio runtime.
pub struct Coordinator {
    storage: BackendHandle,
    transport: TransportHandle,
    in_flight: Registry,
}

impl Coordinator {
    pub fn new(storage: BackendHandle, transport: TransportHandle) -> Self {
        Self {
            storage,
            transport,
            in_flight: Arc::default(),
        }
    }

    pub fn storage(&self) -> &BackendHandle {
        &self.storage
    }

    /// Number of downloads that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.registry().len()
    }

    /// Make sure the body of `url` ends up at `path` in the cache.
    ///
    /// 1. A download already running for `path` is joined.
    /// 2. Otherwise, if `path` exists in storage, it's [`Cached`](Ensured::Cached)
    ///    and the network is never touched.
    /// 3. Otherwise a new download is started.
    ///
    /// Only checking storage can fail here; download failures are reported
    /// through [`Download::wait`], to every caller that joined.
    pub async fn ensure(&self, url: &str, path: impl AsRef<Path>) -> Result<Ensured> {
        let path = validate_path(path.as_ref()).or_raise(|| ErrorKind::Storage("invalid cache path".to_string()))?;
        if let Some(download) = self.join(&path) {
            tracing::trace!(url, path = %path.display(), "Joining in-flight download");
            return Ok(Ensured::Pending(download));
        }
        let exists = self
            .storage
            .exists(&path)
            .await
            .or_raise(|| ErrorKind::Storage(format!("could not check {}", path.display())))?;
        let mut registry = self.registry();
        // A download may have been registered while storage was being checked.
        if let Some(outcome) = registry.get(&path) {
            let outcome = outcome.clone();
            return Ok(Ensured::Pending(Download { path, outcome }));
        }
        if exists {
            return Ok(Ensured::Cached);
        }
        Ok(Ensured::Pending(self.start(url, path, &mut registry)))
    }

    /// [`ensure`](Self::ensure), then wait for any download to settle.
    pub async fn fetch(&self, url: &str, path: impl AsRef<Path>) -> Result<Fetched> {
        match self.ensure(url, path).await? {
            Ensured::Cached => Ok(Fetched::AlreadyPresent),
            Ensured::Pending(download) => download.wait().await,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedOutcome>> {
        // Nothing panics while holding the lock, but don't take the whole
        // session down with it if something ever does.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join(&self, path: &Path) -> Option<Download> {
        let outcome = self.registry().get(path)?.clone();
        Some(Download {
            path: path.to_path_buf(),
            outcome,
        })
    }

    /// Spawn the download and register it. The registry lock is held by the
    /// caller, so the task cannot deregister itself before it is registered.
    fn start(&self, url: &str, path: PathBuf, registry: &mut HashMap<PathBuf, SharedOutcome>) -> Download {
        let release = Release {
            registry: Arc::clone(&self.in_flight),
            path: path.clone(),
        };
        let span = tracing::debug_span!("download", url, path = %path.display());
        let task = tokio::spawn(
            download(Arc::clone(&self.storage), Arc::clone(&self.transport), url.to_string(), path.clone(), release)
                .instrument(span),
        );
        let outcome = async move { task.await.unwrap_or_else(|e| Err(ErrorKind::Aborted(e.to_string()))) }
            .boxed()
            .shared();
        registry.insert(path.clone(), outcome.clone());
        Download { path, outcome }
    }
}

/// Removes a registry entry when its download settles, including by panic.
struct Release {
    registry: Registry,
    path: PathBuf,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.path);
    }
}

async fn download(
    storage: BackendHandle,
    transport: TransportHandle,
    url: String,
    path: PathBuf,
    _release: Release,
) -> Outcome {
    // The previous download of this path may have finished between the
    // caller's existence check and the caller registering this one.
    match storage.exists(&path).await {
        Ok(true) => {
            tracing::debug!("Already downloaded by a concurrent request");
            return Ok(Fetched::AlreadyPresent);
        },
        Ok(false) => {},
        Err(e) => return Err(ErrorKind::Storage(e.to_string())),
    }
    tracing::debug!("downloading");
    let partial = partial_path(&path);
    match stream_into(storage.as_ref(), transport.as_ref(), &url, &path, &partial).await {
        Ok(bytes) => {
            tracing::debug!(bytes, "downloaded");
            Ok(Fetched::Downloaded { bytes })
        },
        Err(kind) => {
            tracing::debug!(error = %kind, "Download failed; discarding partial file");
            discard(storage.as_ref(), &partial).await;
            Err(kind)
        },
    }
}

async fn stream_into(
    storage: &dyn StorageBackend,
    transport: &dyn Transport,
    url: &str,
    path: &Path,
    partial: &Path,
) -> Outcome<u64> {
    let body = transport.get(url).await.map_err(|e| (*e).clone())?;
    let bytes = storage.write_stream(partial, body).await.map_err(|e| write_failure(url, path, &e))?;
    storage.rename(partial, path).await.map_err(|e| ErrorKind::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(bytes)
}

/// A streamed write fails either because the body stopped arriving or
/// because the disk did; only the second one is a write failure.
fn write_failure(url: &str, path: &Path, err: &StorageError) -> ErrorKind {
    match &**err {
        StorageErrorKind::Io(io) if BodyError::is_body_error(io) => ErrorKind::Transport {
            url: url.to_string(),
            reason: io.to_string(),
        },
        other => ErrorKind::Write {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Best-effort removal of a partial download.
async fn discard(storage: &dyn StorageBackend, partial: &Path) {
    match storage.exists(partial).await {
        Ok(false) => {},
        Ok(true) => {
            if let Err(e) = storage.delete(partial).await {
                tracing::warn!(path = %partial.display(), error = %e, "Could not remove partial download");
            }
        },
        Err(e) => tracing::warn!(path = %partial.display(), error = %e, "Could not check for partial download"),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
