//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vendr_config::Settings;
use vendr_rewrite::{Mode, Resolution};

#[derive(Debug, Parser)]
#[command(name = "vendr", version, about = "Vendor remote scripts and stylesheets referenced from HTML documents")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON) [default: vendr.toml in the working directory]
    #[arg(long, global = true, env = "VENDR_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log filter, used when RUST_LOG isn't set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the remote resources of documents and point the documents at the cached copies
    Transform(TransformArgs),
    /// Empty the cache directory
    Clean(CleanArgs),
    /// Print the cache file name a URL is stored under
    Key(KeyArgs),
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// HTML documents to transform
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,
    /// Write documents here, mirroring their path below the build root, instead of to stdout.
    /// Relative references are always computed from a document's source location.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    /// Production build: always wait for downloads, and use public asset paths
    #[arg(long)]
    pub production: bool,
    /// Empty the cache directory first
    #[arg(long)]
    pub force: bool,
    /// Don't wait for downloads in development builds; documents are transformed again once their
    /// downloads finish
    #[arg(long)]
    pub no_await: bool,
    /// How development builds refer to cached files
    #[arg(long, value_enum)]
    pub resolve_mode: Option<ResolveArg>,
}

impl TransformArgs {
    /// Command-line flags take precedence over every configuration layer.
    pub fn apply(&self, settings: &mut Settings) {
        if self.production {
            settings.build.mode = Mode::Production;
        }
        if self.force {
            settings.build.force = true;
        }
        if self.no_await {
            settings.await_download = false;
        }
        if let Some(resolve_mode) = self.resolve_mode {
            settings.resolve_mode = resolve_mode.into();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveArg {
    Relative,
    Fs,
}

impl From<ResolveArg> for Resolution {
    fn from(value: ResolveArg) -> Self {
        match value {
            ResolveArg::Relative => Self::Relative,
            ResolveArg::Fs => Self::FsAbsolute,
        }
    }
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Empty the production cache (the build's asset directory) instead of the development one
    #[arg(long)]
    pub production: bool,
}

#[derive(Debug, Args)]
pub struct KeyArgs {
    pub url: String,
    /// Extension of the cached file
    #[arg(long, short, default_value = ".js")]
    pub extension: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    fn transform_args(args: &[&str]) -> TransformArgs {
        let cli = Cli::try_parse_from(["vendr", "transform"].iter().chain(args)).unwrap();
        let Command::Transform(args) = cli.command else {
            panic!("expected the transform subcommand");
        };
        args
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_transform_requires_documents() {
        assert!(Cli::try_parse_from(["vendr", "transform"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vendr", "key", "https://cdn.example.com/a.js", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, "debug");
        let Command::Key(args) = cli.command else {
            panic!("expected the key subcommand");
        };
        assert_eq!(args.extension, ".js");
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let mut settings = Settings::default();
        transform_args(&["index.html"]).apply(&mut settings);
        assert_eq!(settings, Settings::default());
    }

    #[rstest]
    #[case(&["--production"], Mode::Production, false, true, Resolution::Relative)]
    #[case(&["--force"], Mode::Development, true, true, Resolution::Relative)]
    #[case(&["--no-await"], Mode::Development, false, false, Resolution::Relative)]
    #[case(&["--resolve-mode", "fs"], Mode::Development, false, true, Resolution::FsAbsolute)]
    fn test_flags_override_settings(
        #[case] flags: &[&str],
        #[case] mode: Mode,
        #[case] force: bool,
        #[case] await_download: bool,
        #[case] resolve_mode: Resolution,
    ) {
        let mut args = vec!["index.html"];
        args.extend_from_slice(flags);
        let mut settings = Settings::default();
        transform_args(&args).apply(&mut settings);
        assert_eq!(settings.build.mode, mode);
        assert_eq!(settings.build.force, force);
        assert_eq!(settings.await_download, await_download);
        assert_eq!(settings.resolve_mode, resolve_mode);
    }
}
