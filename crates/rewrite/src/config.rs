//! Engine settings and the build the engine is running in.

use crate::kind::ResourceKinds;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_ASSETS_DIR: &str = "node_modules/.remote-scripts";
pub const DEFAULT_MATCH_ATTRIBUTE: &str = "data-remote-script";
pub const DEFAULT_CHUNK_PREFIX: &str = "remote-script.";

/// How a development build refers to a cached file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Resolution {
    /// A `./` or `../` path from the document's directory.
    #[default]
    Relative,
    /// An absolute filesystem path behind the `/@fs` prefix.
    #[cfg_attr(feature = "serde", serde(rename = "fs"))]
    FsAbsolute,
}

pub type Resolver = Arc<dyn Fn(&str, &str) -> Resolution + Send + Sync>;

/// Either a fixed [`Resolution`] or one chosen per reference from the
/// document id and the remote URL.
#[derive(Clone)]
pub enum ResolveMode {
    Static(Resolution),
    Dynamic(Resolver),
}

impl ResolveMode {
    /// ```
    /// use vendr_rewrite::{ResolveMode, Resolution};
    ///
    /// let mode = ResolveMode::dynamic(|document, _url| {
    ///     if document.starts_with("/outside/") { Resolution::FsAbsolute } else { Resolution::Relative }
    /// });
    /// assert_eq!(mode.resolve("/outside/index.html", "https://cdn.example.com/a.js"), Resolution::FsAbsolute);
    /// assert_eq!(mode.resolve("/project/index.html", "https://cdn.example.com/a.js"), Resolution::Relative);
    /// ```
    pub fn dynamic(resolver: impl Fn(&str, &str) -> Resolution + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(resolver))
    }

    pub fn resolve(&self, document: &str, url: &str) -> Resolution {
        match self {
            Self::Static(resolution) => *resolution,
            Self::Dynamic(resolver) => resolver(document, url),
        }
    }
}

impl Default for ResolveMode {
    fn default() -> Self {
        Self::Static(Resolution::default())
    }
}

impl From<Resolution> for ResolveMode {
    fn from(resolution: Resolution) -> Self {
        Self::Static(resolution)
    }
}

impl fmt::Debug for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(resolution) => f.debug_tuple("Static").field(resolution).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache directory for development builds, relative to the build root.
    pub assets_dir: PathBuf,
    /// Only elements carrying this attribute are vendored.
    pub match_attribute: String,
    /// Prepended to every cached file name.
    pub chunk_prefix: String,
    pub resolve_mode: ResolveMode,
    /// Development builds wait for downloads instead of deferring them.
    /// Production builds always wait.
    pub await_download: bool,
    pub kinds: ResourceKinds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            match_attribute: DEFAULT_MATCH_ATTRIBUTE.to_string(),
            chunk_prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            resolve_mode: ResolveMode::default(),
            await_download: true,
            kinds: ResourceKinds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    #[default]
    Development,
    Production,
}

/// The build the engine is serving, as resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub mode: Mode,
    /// Project root. Document ids and the development cache directory are
    /// resolved against it.
    pub root: PathBuf,
    /// Build output directory, relative to the root.
    pub out_dir: PathBuf,
    /// Directory for emitted assets inside the output directory.
    pub assets_subdir: String,
    /// Public base path the built site is served from.
    pub base: String,
    /// Empty the cache directory before use.
    pub force: bool,
}

impl BuildContext {
    pub fn new(mode: Mode, root: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            root: root.into(),
            out_dir: PathBuf::from("dist"),
            assets_subdir: "assets".to_string(),
            base: "/".to_string(),
            force: false,
        }
    }

    pub fn development(root: impl Into<PathBuf>) -> Self {
        Self::new(Mode::Development, root)
    }

    pub fn production(root: impl Into<PathBuf>) -> Self {
        Self::new(Mode::Production, root)
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Where cached files live for this build.
    ///
    /// ```
    /// use std::path::Path;
    /// use vendr_rewrite::{BuildContext, EngineConfig};
    ///
    /// let config = EngineConfig::default();
    /// assert_eq!(
    ///     BuildContext::development("/project").cache_dir(&config),
    ///     Path::new("/project/node_modules/.remote-scripts"),
    /// );
    /// assert_eq!(BuildContext::production("/project").cache_dir(&config), Path::new("/project/dist/assets"));
    /// ```
    pub fn cache_dir(&self, config: &EngineConfig) -> PathBuf {
        match self.mode {
            Mode::Production => self.root.join(&self.out_dir).join(&self.assets_subdir),
            Mode::Development => self.root.join(&config.assets_dir),
        }
    }

    /// Whether a download must finish before the document referencing it is
    /// returned.
    pub fn is_blocking(&self, config: &EngineConfig) -> bool {
        self.mode == Mode::Production || config.await_download
    }

    pub(crate) fn document_path(&self, document: &str) -> PathBuf {
        self.root.join(Path::new(document))
    }
}
