//! Configuration loading and validation.
//!
//! Settings are layered, later layers overriding earlier ones:
//! 1. Built-in defaults.
//! 2. The user's `config.toml`, in the platform's configuration directory.
//! 3. The project's file: the one passed explicitly, otherwise `vendr.toml`,
//!    `vendr.yaml` or `vendr.json` in the working directory.
//! 4. `VENDR_*` environment variables, with `__` between nested keys
//!    (`VENDR_BUILD__MODE=production`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vendr_fetch::transport::TransportOptions;
use vendr_rewrite::{
    BuildContext, DEFAULT_ASSETS_DIR, DEFAULT_CHUNK_PREFIX, DEFAULT_MATCH_ATTRIBUTE, EngineConfig, Mode, ResolveMode,
    Resolution, ResourceKind, ResourceKinds,
};

pub const ENV_PREFIX: &str = "VENDR_";
pub const PROJECT_FILES: [&str; 3] = ["vendr.toml", "vendr.yaml", "vendr.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Development cache directory, relative to the build root.
    pub assets_dir: PathBuf,
    /// Elements must carry this attribute to be vendored.
    pub attribute_name: String,
    pub chunk_prefix: String,
    pub resolve_mode: Resolution,
    pub await_download: bool,
    pub build: BuildSettings,
    pub fetch: FetchSettings,
    /// Extra resource kinds, keyed by tag name. Override the defaults when
    /// the tag is `script` or `link`.
    pub kinds: BTreeMap<String, ResourceKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub mode: Mode,
    /// Resolved against the working directory.
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub assets_subdir: String,
    pub base: String,
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            attribute_name: DEFAULT_MATCH_ATTRIBUTE.to_string(),
            chunk_prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            resolve_mode: Resolution::default(),
            await_download: true,
            build: BuildSettings::default(),
            fetch: FetchSettings::default(),
            kinds: BTreeMap::new(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            root: PathBuf::from("."),
            out_dir: PathBuf::from("dist"),
            assets_subdir: "assets".to_string(),
            base: "/".to_string(),
            force: false,
        }
    }
}

/// Location of the user's configuration file, if the platform has a
/// configuration directory.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "vendr").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Settings {
    /// Load and validate every configuration layer.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::extract(Self::figment(file)?)
    }

    /// The layered configuration sources, without extracting them.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(user) = user_config_file().filter(|path| path.is_file()) {
            tracing::debug!(path = %user.display(), "Loading user configuration");
            figment = figment.merge(Toml::file_exact(user));
        }
        figment = match file {
            Some(path) => merge_file(figment, path)?,
            // Project files are optional; only the ones present are merged.
            None => PROJECT_FILES
                .iter()
                .map(Path::new)
                .filter(|path| path.is_file())
                .try_fold(figment, merge_file)?,
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        let settings: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.attribute_name.is_empty() {
            exn::bail!(ErrorKind::Invalid("attribute_name must not be empty".to_string()));
        }
        if self.chunk_prefix.is_empty() {
            exn::bail!(ErrorKind::Invalid("chunk_prefix must not be empty".to_string()));
        }
        if self.chunk_prefix.contains(['/', '\\']) {
            exn::bail!(ErrorKind::Invalid("chunk_prefix must not contain path separators".to_string()));
        }
        if self.build.assets_subdir.is_empty() {
            exn::bail!(ErrorKind::Invalid("build.assets_subdir must not be empty".to_string()));
        }
        if self.fetch.timeout_secs == Some(0) {
            exn::bail!(ErrorKind::Invalid("fetch.timeout_secs must be at least 1".to_string()));
        }
        for (tag, kind) in &self.kinds {
            if kind.attribute.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("kinds.{tag}.attribute must not be empty")));
            }
            if !kind.extension.starts_with('.') {
                exn::bail!(ErrorKind::Invalid(format!("kinds.{tag}.extension must start with '.'")));
            }
            if kind.extension.contains(['/', '\\']) {
                exn::bail!(ErrorKind::Invalid(format!("kinds.{tag}.extension must not contain path separators")));
            }
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let kinds = self.kinds.iter().fold(ResourceKinds::default(), |kinds, (tag, kind)| {
            kinds.with_kind(tag, ResourceKind::new(kind.attribute.as_str(), kind.extension.as_str()))
        });
        EngineConfig {
            assets_dir: self.assets_dir.clone(),
            match_attribute: self.attribute_name.clone(),
            chunk_prefix: self.chunk_prefix.clone(),
            resolve_mode: ResolveMode::Static(self.resolve_mode),
            await_download: self.await_download,
            kinds,
        }
    }

    pub fn build_context(&self) -> Result<BuildContext> {
        let root = std::path::absolute(&self.build.root)
            .or_raise(|| ErrorKind::Invalid(format!("build.root cannot be resolved: {}", self.build.root.display())))?;
        Ok(BuildContext {
            mode: self.build.mode,
            root,
            out_dir: self.build.out_dir.clone(),
            assets_subdir: self.build.assets_subdir.clone(),
            base: self.build.base.clone(),
            force: self.build.force,
        })
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: self.fetch.timeout_secs.map(Duration::from_secs),
            user_agent: self.fetch.user_agent.clone(),
        }
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    if !path.is_file() {
        exn::bail!(ErrorKind::Invalid(format!("configuration file not found: {}", path.display())));
    }
    tracing::debug!(path = %path.display(), "Loading configuration file");
    Ok(match path.extension().and_then(|extension| extension.to_str()) {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::Invalid(format!("unsupported configuration format: {}", path.display()))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn from_toml(toml: &str) -> Result<Settings> {
        Settings::extract(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
    }

    #[test]
    fn test_defaults_match_engine_defaults() {
        let settings = from_toml("").unwrap();
        let config = settings.engine_config();
        let defaults = EngineConfig::default();
        assert_eq!(config.assets_dir, defaults.assets_dir);
        assert_eq!(config.match_attribute, defaults.match_attribute);
        assert_eq!(config.chunk_prefix, defaults.chunk_prefix);
        assert_eq!(config.await_download, defaults.await_download);
        assert_eq!(config.kinds, defaults.kinds);
        assert!(matches!(config.resolve_mode, ResolveMode::Static(Resolution::Relative)));
        assert_eq!(settings.transport_options(), TransportOptions::default());
    }

    #[test]
    fn test_full_file() {
        let settings = from_toml(
            r#"
            assets_dir = ".cache/vendor"
            attribute_name = "data-vendor"
            chunk_prefix = "vendored."
            resolve_mode = "fs"
            await_download = false

            [build]
            mode = "production"
            root = "/srv/site"
            out_dir = "public"
            assets_subdir = "static"
            base = "/app/"
            force = true

            [fetch]
            timeout_secs = 30
            user_agent = "site-builder/1.0"

            [kinds.img]
            attribute = "SRC"
            extension = ".png"
            "#,
        )
        .unwrap();

        let config = settings.engine_config();
        assert_eq!(config.assets_dir, Path::new(".cache/vendor"));
        assert_eq!(config.match_attribute, "data-vendor");
        assert_eq!(config.chunk_prefix, "vendored.");
        assert!(matches!(config.resolve_mode, ResolveMode::Static(Resolution::FsAbsolute)));
        assert!(!config.await_download);
        assert_eq!(config.kinds.get("img"), Some(&ResourceKind::new("src", ".png")));
        assert!(config.kinds.get("script").is_some());

        let context = settings.build_context().unwrap();
        assert_eq!(context.mode, Mode::Production);
        assert_eq!(context.root, Path::new("/srv/site"));
        assert_eq!(context.cache_dir(&config), Path::new("/srv/site/public/static"));
        assert_eq!(context.base, "/app/");
        assert!(context.force);

        let options = settings.transport_options();
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.user_agent.as_deref(), Some("site-builder/1.0"));
    }

    #[test]
    fn test_relative_root_is_resolved() {
        let context = from_toml("").unwrap().build_context().unwrap();
        assert!(context.root.is_absolute());
    }

    #[rstest]
    #[case(r#"attribute_name = """#)]
    #[case(r#"chunk_prefix = """#)]
    #[case(r#"chunk_prefix = "nested/prefix.""#)]
    #[case("build.assets_subdir = \"\"")]
    #[case("fetch.timeout_secs = 0")]
    #[case("kinds.img = { attribute = \"src\", extension = \"png\" }")]
    #[case("kinds.img = { attribute = \"\", extension = \".png\" }")]
    #[case("kinds.img = { attribute = \"src\", extension = \".png/../x\" }")]
    fn test_invalid(#[case] toml: &str) {
        let err = from_toml(toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "unexpected error: {err:?}");
    }

    #[rstest]
    #[case(r#"await_download = "sometimes""#)]
    #[case(r#"resolve_mode = "absolute""#)]
    #[case(r#"build.mode = "staging""#)]
    fn test_unloadable(#[case] toml: &str) {
        let err = from_toml(toml).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn test_explicit_file_by_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("site.yaml");
        std::fs::write(&path, "chunk_prefix: site.\nbuild:\n  mode: production\n").unwrap();
        let figment = Settings::figment(Some(&path)).unwrap();
        let settings = Settings::extract(figment).unwrap();
        assert_eq!(settings.chunk_prefix, "site.");
        assert_eq!(settings.build.mode, Mode::Production);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Settings::figment(Some(&temp_dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_explicit_file_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vendr.ini");
        std::fs::write(&path, "chunk_prefix = site.").unwrap();
        let err = Settings::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_project_file_and_environment() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "vendr.toml",
                r#"
                chunk_prefix = "vendored."
                [build]
                mode = "production"
                base = "/from-file/"
                "#,
            )?;
            jail.set_env("VENDR_BUILD__BASE", "/from-env/");
            jail.set_env("VENDR_AWAIT_DOWNLOAD", "false");
            let settings = Settings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(settings.chunk_prefix, "vendored.");
            assert_eq!(settings.build.mode, Mode::Production);
            assert_eq!(settings.build.base, "/from-env/");
            assert!(!settings.await_download);
            Ok(())
        });
    }

    #[test]
    fn test_no_project_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VENDR_CHUNK_PREFIX", "env.");
            let settings = Settings::load(None).map_err(|e| format!("{e:?}"))?;
            assert_eq!(settings.chunk_prefix, "env.");
            assert_eq!(settings.build, BuildSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_project_file_alone() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("vendr.yaml", "attribute_name: data-vendor\n")?;
            let settings = Settings::load(None).map_err(|e| format!("{e:?}"))?;
            assert_eq!(settings.attribute_name, "data-vendor");
            assert_eq!(settings.chunk_prefix, DEFAULT_CHUNK_PREFIX);
            Ok(())
        });
    }
}
