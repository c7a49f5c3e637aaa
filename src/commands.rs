//! Subcommand implementations.

use crate::cli::{CleanArgs, Cli, KeyArgs, TransformArgs};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use vendr_config::Settings;
use vendr_fetch::CacheKey;
use vendr_fetch::transport::ReqwestTransport;
use vendr_rewrite::{Engine, Mode, Transformed, is_remote};
use vendr_storage::StorageBackend;
use vendr_storage::backend::LocalBackend;

fn settings(cli: &Cli) -> Result<Settings> {
    Settings::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)
}

/// Where transformed documents go.
enum Output {
    /// Mirror each document's path below `root` into `dir`.
    Directory { dir: PathBuf, root: PathBuf },
    /// Keep the latest version of the only document, printed once done.
    Stdout(Mutex<Option<String>>),
}

impl Output {
    fn path(dir: &Path, root: &Path, document: &Path) -> PathBuf {
        match document.strip_prefix(root) {
            Ok(relative) => dir.join(relative),
            Err(_) => dir.join(document.file_name().unwrap_or(document.as_os_str())),
        }
    }

    async fn write(&self, document: &Path, markup: String) -> Result<()> {
        match self {
            Self::Directory { dir, root } => {
                let path = Self::path(dir, root, document);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Write(parent.to_path_buf()))?;
                }
                tokio::fs::write(&path, markup).await.or_raise(|| ErrorKind::Write(path.clone()))?;
                tracing::debug!(path = %path.display(), "Wrote document");
            },
            Self::Stdout(latest) => {
                *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(markup);
            },
        }
        Ok(())
    }

    fn finish(self) {
        if let Self::Stdout(latest) = self
            && let Some(markup) = latest.into_inner().unwrap_or_else(PoisonError::into_inner)
        {
            println!("{markup}");
        }
    }
}

pub async fn transform(cli: &Cli, args: &TransformArgs) -> Result<()> {
    if args.out.is_none() && args.documents.len() > 1 {
        exn::bail!(ErrorKind::Usage("--out is required when transforming more than one document".to_string()));
    }
    let mut settings = settings(cli)?;
    args.apply(&mut settings);
    let context = settings.build_context().or_raise(|| ErrorKind::Config)?;
    let transport = ReqwestTransport::with_options(&settings.transport_options()).or_raise(|| ErrorKind::Config)?;

    let (invalidated, mut invalidations) = mpsc::unbounded_channel::<String>();
    let engine = Engine::prepare(settings.engine_config(), context, Arc::new(transport))
        .await
        .or_raise(|| ErrorKind::Cache)?
        .with_invalidator(Arc::new(move |id: &str| {
            if invalidated.send(id.to_string()).is_err() {
                tracing::debug!(document = id, "Invalidated after the run finished");
            }
        }));
    let output = match &args.out {
        Some(dir) => Output::Directory {
            dir: dir.clone(),
            root: engine.context().root.clone(),
        },
        None => Output::Stdout(Mutex::new(None)),
    };

    let documents = args
        .documents
        .iter()
        .map(|document| std::path::absolute(document).or_raise(|| ErrorKind::Read(document.clone())))
        .collect::<Result<Vec<_>>>()?;
    try_join_all(documents.iter().map(|document| pass(&engine, &output, document))).await?;

    // Deferred downloads invalidate their documents once they land; keep
    // transforming until nothing is left waiting.
    loop {
        engine.settle().await;
        let mut pending = BTreeSet::new();
        while let Ok(id) = invalidations.try_recv() {
            pending.insert(PathBuf::from(id));
        }
        if pending.is_empty() {
            break;
        }
        tracing::info!(documents = pending.len(), "Transforming invalidated documents again");
        try_join_all(pending.iter().map(|document| pass(&engine, &output, document))).await?;
    }

    output.finish();
    Ok(())
}

async fn pass(engine: &Engine, output: &Output, document: &Path) -> Result<()> {
    let markup = tokio::fs::read_to_string(document).await.or_raise(|| ErrorKind::Read(document.to_path_buf()))?;
    let id = document.to_string_lossy();
    let transformed =
        engine.transform(&markup, &id).await.or_raise(|| ErrorKind::Transform(document.to_path_buf()))?;
    let markup = match transformed {
        Transformed::Unchanged => {
            tracing::info!(document = %document.display(), "Unchanged");
            markup
        },
        Transformed::Rewritten(rewritten) => {
            tracing::info!(document = %document.display(), "Rewritten");
            rewritten
        },
    };
    output.write(document, markup).await
}

pub async fn clean(cli: &Cli, args: &CleanArgs) -> Result<()> {
    let mut settings = settings(cli)?;
    if args.production {
        settings.build.mode = Mode::Production;
    }
    let context = settings.build_context().or_raise(|| ErrorKind::Config)?;
    let cache_dir = context.cache_dir(&settings.engine_config());
    if !tokio::fs::try_exists(&cache_dir).await.or_raise(|| ErrorKind::Read(cache_dir.clone()))? {
        tracing::info!(cache_dir = %cache_dir.display(), "Nothing to clean");
        return Ok(());
    }
    let storage = LocalBackend::new("cache", &cache_dir).or_raise(|| ErrorKind::Cache)?;
    let removed = storage.empty().await.or_raise(|| ErrorKind::Cache)?;
    tracing::info!(removed, cache_dir = %cache_dir.display(), "Emptied asset cache");
    Ok(())
}

pub fn key(cli: &Cli, args: &KeyArgs) -> Result<()> {
    let settings = settings(cli)?;
    if !is_remote(&args.url) {
        tracing::warn!(url = %args.url, "Not an absolute http(s) URL, so it would never be vendored");
    }
    println!("{}", CacheKey::derive(&args.url).file_name(&settings.chunk_prefix, &args.extension));
    Ok(())
}
