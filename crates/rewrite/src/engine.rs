//! Rewriting documents to use vendored copies of their remote resources.

use crate::config::{BuildContext, EngineConfig};
use crate::document::{Document, Edit};
use crate::error::{Error, ErrorKind, Result};
use crate::rewriter::Rewriter;
use crate::scan::{Reference, Scanner};
use exn::ResultExt;
use futures::future::{join_all, try_join_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, instrument};
use vendr_fetch::transport::TransportHandle;
use vendr_fetch::{CacheKey, Coordinator, Download, Ensured};
use vendr_storage::BackendHandle;
use vendr_storage::backend::LocalBackend;

/// The host's way of marking a document stale so it gets transformed again.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self, document: &str);
}

impl<F> Invalidate for F
where
    F: Fn(&str) + Send + Sync,
{
    fn invalidate(&self, document: &str) {
        self(document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// Nothing was rewritten; keep using the input.
    Unchanged,
    Rewritten(String),
}

impl Transformed {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    pub fn into_markup(self) -> Option<String> {
        match self {
            Self::Unchanged => None,
            Self::Rewritten(markup) => Some(markup),
        }
    }
}

/// Rewrites documents for one build session.
///
/// # Blocking and deferred downloads
/// Production builds, and development builds with
/// [`await_download`](EngineConfig::await_download) set, wait for every
/// download a document needs and rewrite all of its references. Otherwise
/// missing files are downloaded in the background, the references are left
/// alone for now, and the document is [invalidated](Invalidate) once the
/// downloads settle so the host transforms it again.
pub struct Engine {
    config: EngineConfig,
    context: BuildContext,
    cache_dir: PathBuf,
    scanner: Scanner,
    coordinator: Coordinator,
    invalidator: Option<Arc<dyn Invalidate>>,
    deferred: TaskTracker,
    settling: Mutex<()>,
}

impl Engine {
    /// Create the cache directory on the local filesystem (emptying it if the
    /// build context asks for it) and build an engine around it.
    pub async fn prepare(config: EngineConfig, context: BuildContext, transport: TransportHandle) -> Result<Self> {
        let cache_dir = absolute(&context.cache_dir(&config))?;
        let storage = LocalBackend::new("cache", &cache_dir).or_raise(|| ErrorKind::Storage)?;
        Self::with_storage(config, context, Arc::new(storage), transport).await
    }

    /// Build an engine around `storage`, which must be rooted at the cache
    /// directory of `context`.
    pub async fn with_storage(
        config: EngineConfig,
        context: BuildContext,
        storage: BackendHandle,
        transport: TransportHandle,
    ) -> Result<Self> {
        let scanner = Scanner::new(config.kinds.clone(), &config.match_attribute)?;
        let cache_dir = absolute(&context.cache_dir(&config))?;
        if context.force {
            let removed = storage.empty().await.or_raise(|| ErrorKind::Storage)?;
            tracing::info!(removed, cache_dir = %cache_dir.display(), "Emptied asset cache");
        }
        tracing::debug!(
            mode = ?context.mode,
            cache_dir = %cache_dir.display(),
            storage = storage.name(),
            "Asset cache ready"
        );
        Ok(Self {
            config,
            context,
            cache_dir,
            scanner,
            coordinator: Coordinator::new(storage, transport),
            invalidator: None,
            deferred: TaskTracker::new(),
            settling: Mutex::new(()),
        })
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn Invalidate>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Number of documents still waiting on deferred downloads.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Rewrite the remote references of document `id` that are (or, when
    /// blocking, become) available in the cache.
    ///
    /// `id` is the document's path, relative to the build root or absolute.
    /// Returns [`Transformed::Unchanged`] rather than re-serializing when no
    /// reference was rewritten.
    #[instrument(skip(self, markup), fields(markup_size = markup.len()))]
    pub async fn transform(&self, markup: &str, id: &str) -> Result<Transformed> {
        // Parsed documents aren't `Send`, so none may live across an await.
        // The markup is parsed again if there's anything to edit.
        let references = self.scanner.scan(&Document::parse(markup));
        if references.is_empty() {
            return Ok(Transformed::Unchanged);
        }
        let blocking = self.context.is_blocking(&self.config);
        let mut ready = Vec::new();
        let mut awaited = Vec::new();
        let mut deferred = Vec::new();
        let mut failure = None;
        for reference in references {
            tracing::debug!(url = %reference.url, tag = %reference.tag, "detected");
            let file_name = CacheKey::derive(&reference.url).file_name(&self.config.chunk_prefix, &reference.extension);
            match self.coordinator.ensure(&reference.url, &file_name).await.or_raise(|| ErrorKind::Storage) {
                Ok(Ensured::Cached) => ready.push((reference, file_name)),
                Ok(Ensured::Pending(download)) if blocking => awaited.push((reference, file_name, download)),
                Ok(Ensured::Pending(download)) => deferred.push(download),
                Err(e) => {
                    failure = Some(e);
                    break;
                },
            }
        }
        // Downloads started before a failure keep running either way; they
        // still get logged and still invalidate the document.
        if !deferred.is_empty() {
            self.defer(id, deferred);
        }
        if let Some(e) = failure {
            return Err(e);
        }
        let downloaded = try_join_all(awaited.into_iter().map(|(reference, file_name, download)| async move {
            download.wait().await.or_raise(|| ErrorKind::Download(reference.url.clone()))?;
            Ok::<_, Error>((reference, file_name))
        }))
        .await?;
        ready.extend(downloaded);
        if ready.is_empty() {
            return Ok(Transformed::Unchanged);
        }
        self.apply(markup, id, ready)
    }

    /// Wait for every deferred download started so far, and for the
    /// invalidations they trigger.
    ///
    /// Concurrent callers take turns, so none of them sees the tracker
    /// reopened by another before its own wait is over.
    pub async fn settle(&self) {
        let _settling = self.settling.lock().await;
        self.deferred.close();
        self.deferred.wait().await;
        self.deferred.reopen();
    }

    fn apply(&self, markup: &str, id: &str, ready: Vec<(Reference, String)>) -> Result<Transformed> {
        let document_path = absolute(&self.context.document_path(id))?;
        let rewriter = Rewriter {
            context: &self.context,
            resolve_mode: &self.config.resolve_mode,
            cache_dir: &self.cache_dir,
        };
        let edits = ready
            .into_iter()
            .map(|(reference, file_name)| {
                Ok(Edit {
                    value: rewriter.rewrite(id, &document_path, &reference.url, &file_name)?,
                    position: reference.position,
                    attribute: reference.attribute,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut document = Document::parse(markup);
        let applied = document.apply(self.scanner.selector(), &edits);
        if applied == 0 {
            return Ok(Transformed::Unchanged);
        }
        tracing::debug!(applied, "Rewrote remote references");
        Ok(Transformed::Rewritten(document.serialize()))
    }

    /// Invalidate `id` once `downloads` settle, provided at least one of them
    /// succeeded. Failures are logged and otherwise dropped.
    fn defer(&self, id: &str, downloads: Vec<Download>) {
        let invalidator = self.invalidator.clone();
        let id = id.to_string();
        let span = tracing::debug_span!("deferred", document = %id, downloads = downloads.len());
        self.deferred.spawn(
            async move {
                let outcomes = join_all(downloads.into_iter().map(|download| async move {
                    let path = download.path().to_path_buf();
                    (path, download.wait().await)
                }))
                .await;
                let mut succeeded = 0;
                for (path, outcome) in outcomes {
                    match outcome {
                        Ok(_) => succeeded += 1,
                        Err(e) => tracing::error!(path = %path.display(), error = ?e, "Deferred download failed"),
                    }
                }
                if succeeded == 0 {
                    tracing::debug!("No deferred download succeeded; not invalidating");
                    return;
                }
                match invalidator {
                    Some(invalidator) => {
                        tracing::debug!("Invalidating document");
                        invalidator.invalidate(&id);
                    },
                    None => tracing::trace!("No invalidator registered"),
                }
            }
            .instrument(span),
        );
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).or_raise(|| ErrorKind::InvalidPath(path.display().to_string()))
}
