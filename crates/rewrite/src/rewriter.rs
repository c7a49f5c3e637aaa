//! Replacement references for vendored files.

use crate::config::{BuildContext, Mode, ResolveMode, Resolution};
use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Prefix dev servers use for files outside the project root.
pub const FS_PREFIX: &str = "/@fs";

/// Computes what a vendored reference is rewritten to.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'a> {
    pub context: &'a BuildContext,
    pub resolve_mode: &'a ResolveMode,
    /// Absolute cache directory.
    pub cache_dir: &'a Path,
}

impl Rewriter<'_> {
    /// Replacement for the reference to `url` found in document `id`, whose
    /// absolute path is `document`, now cached as `file_name`.
    ///
    /// Production builds always use the public asset path, whatever the
    /// resolve mode says.
    pub fn rewrite(&self, id: &str, document: &Path, url: &str, file_name: &str) -> Result<String> {
        match self.context.mode {
            Mode::Production => Ok(production(&self.context.base, &self.context.assets_subdir, file_name)),
            Mode::Development => match self.resolve_mode.resolve(id, url) {
                Resolution::Relative => relative(document, self.cache_dir, file_name),
                Resolution::FsAbsolute => Ok(fs_absolute(self.cache_dir, file_name)),
            },
        }
    }
}

/// `<base><assets_subdir>/<file_name>`, where the bundler puts cached files.
pub fn production(base: &str, assets_subdir: &str, file_name: &str) -> String {
    format!("{base}{assets_subdir}/{file_name}")
}

/// Path from the directory of `document` to the cached file, always
/// starting with `./` or `../` and always using `/` separators.
///
/// ```
/// use std::path::Path;
/// use vendr_rewrite::rewriter::relative;
///
/// let path = relative(Path::new("/project/index.html"), Path::new("/project/.cache"), "a.js").unwrap();
/// assert_eq!(path, "./.cache/a.js");
/// ```
pub fn relative(document: &Path, cache_dir: &Path, file_name: &str) -> Result<String> {
    let from = document.parent().unwrap_or(Path::new(""));
    let target = cache_dir.join(file_name);
    let path = diff_paths(&target, from).ok_or_else(|| {
        ErrorKind::InvalidPath(format!("{} is not reachable from {}", target.display(), from.display()))
    })?;
    let path = path.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
    // Without a leading dot segment the result would read as a bare package name.
    if path.starts_with("./") || path.starts_with("../") {
        Ok(path)
    } else {
        Ok(format!("./{path}"))
    }
}

/// The cached file's absolute path behind [`FS_PREFIX`], with exactly one
/// slash between the two.
pub fn fs_absolute(cache_dir: &Path, file_name: &str) -> String {
    let path = cache_dir.join(file_name).to_string_lossy().replace('\\', "/");
    format!("{FS_PREFIX}/{}", path.trim_start_matches('/'))
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                },
                // `..` at the root is the root.
                Some(Component::RootDir | Component::Prefix(_)) => {},
                _ => normalized.push(Component::ParentDir),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Path leading from `base` to `target`. Both must be absolute, or both
/// relative; `None` if there is no such path (different drives, or `base`
/// climbs above where `target` is known).
fn diff_paths(target: &Path, base: &Path) -> Option<PathBuf> {
    let target = normalize(target);
    let base = normalize(base);
    if target.is_absolute() != base.is_absolute() {
        return None;
    }
    let mut target = target.components().peekable();
    let mut base = base.components().peekable();
    while let (Some(a), Some(b)) = (target.peek(), base.peek()) {
        if a != b {
            break;
        }
        target.next();
        base.next();
    }
    let mut path = PathBuf::new();
    for component in base {
        match component {
            Component::Normal(_) => path.push(Component::ParentDir),
            _ => return None,
        }
    }
    path.extend(target);
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/project/index.html", "/project/node_modules/.remote-scripts", "./node_modules/.remote-scripts/a.js")]
    #[case("/project/pages/about.html", "/project/node_modules/.remote-scripts", "../node_modules/.remote-scripts/a.js")]
    #[case("/project/a/b/c.html", "/project/cache", "../../cache/a.js")]
    #[case("/project/cache/index.html", "/project/cache", "./a.js")]
    #[case("/project/./pages/../index.html", "/project/cache/", "./cache/a.js")]
    #[case("/index.html", "/cache", "./cache/a.js")]
    fn test_relative(#[case] document: &str, #[case] cache_dir: &str, #[case] expected: &str) {
        let path = relative(Path::new(document), Path::new(cache_dir), "a.js").unwrap();
        assert_eq!(path, expected);
        assert!(path.starts_with("./") || path.starts_with("../"));
    }

    #[test]
    fn test_relative_needs_comparable_paths() {
        let err = relative(Path::new("/project/index.html"), Path::new("cache"), "a.js").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[rstest]
    #[case("/", "assets", "/assets/remote-script.0123456789abcdef.js")]
    #[case("/app/", "static", "/app/static/remote-script.0123456789abcdef.js")]
    #[case("https://cdn.example.org/", "assets", "https://cdn.example.org/assets/remote-script.0123456789abcdef.js")]
    fn test_production(#[case] base: &str, #[case] assets_subdir: &str, #[case] expected: &str) {
        let url = production(base, assets_subdir, "remote-script.0123456789abcdef.js");
        assert_eq!(url, expected);
        assert!(url.starts_with(&format!("{base}{assets_subdir}")));
    }

    #[rstest]
    #[case("/project/cache", "/@fs/project/cache/a.js")]
    #[case("project/cache", "/@fs/project/cache/a.js")]
    #[case("//project/cache", "/@fs/project/cache/a.js")]
    fn test_fs_absolute(#[case] cache_dir: &str, #[case] expected: &str) {
        assert_eq!(fs_absolute(Path::new(cache_dir), "a.js"), expected);
    }

    #[rstest]
    #[case(Mode::Production, Resolution::Relative, "/assets/a.js")]
    #[case(Mode::Production, Resolution::FsAbsolute, "/assets/a.js")]
    #[case(Mode::Development, Resolution::Relative, "./cache/a.js")]
    #[case(Mode::Development, Resolution::FsAbsolute, "/@fs/project/cache/a.js")]
    fn test_rewrite_by_mode(#[case] mode: Mode, #[case] resolution: Resolution, #[case] expected: &str) {
        let context = BuildContext::new(mode, "/project");
        let resolve_mode = ResolveMode::from(resolution);
        let rewriter = Rewriter {
            context: &context,
            resolve_mode: &resolve_mode,
            cache_dir: Path::new("/project/cache"),
        };
        let rewritten =
            rewriter.rewrite("index.html", Path::new("/project/index.html"), "https://cdn.example.com/a.js", "a.js");
        assert_eq!(rewritten.unwrap(), expected);
    }

    #[test]
    fn test_rewrite_dynamic_sees_document_id_and_url() {
        let context = BuildContext::development("/project");
        let resolve_mode = ResolveMode::dynamic(|id, url| {
            if id == "vendor.html" && url.ends_with(".css") { Resolution::FsAbsolute } else { Resolution::Relative }
        });
        let rewriter = Rewriter {
            context: &context,
            resolve_mode: &resolve_mode,
            cache_dir: Path::new("/project/cache"),
        };
        let document = Path::new("/project/vendor.html");
        assert_eq!(
            rewriter.rewrite("vendor.html", document, "https://cdn.example.com/a.css", "a.css").unwrap(),
            "/@fs/project/cache/a.css"
        );
        assert_eq!(rewriter.rewrite("vendor.html", document, "https://cdn.example.com/a.js", "a.js").unwrap(), "./cache/a.js");
    }
}
