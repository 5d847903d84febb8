// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `devwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devwatch",
    version,
    about = "Keep a local functions build and emulator running while you edit.",
    long_about = None
)]
pub struct CliArgs {
    /// Environment name passed to the emulator as `DEVWATCH_ENV`.
    #[arg(long, value_name = "NAME", default_value = "dev")]
    pub env: String,

    /// Do not start the backend emulator.
    #[arg(long)]
    pub no_emulator: bool,

    /// The functions directory (contains `package.json`, `src/`, `lib/`).
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub project_dir: PathBuf,

    /// Path to the config file (TOML), relative to the project directory.
    ///
    /// Default: `Devwatch.toml`. A missing file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVWATCH_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Disable ANSI colors in task output. `NO_COLOR` has the same effect.
    #[arg(long)]
    pub no_color: bool,

    /// Copy matching source files to the output tree once, then exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub sync_only: bool,

    /// Print the resolved configuration and exit without starting anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Colors are on unless `--no-color` is given or `NO_COLOR` is set.
    pub fn color_enabled(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty())
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["devwatch"]).unwrap();
        assert_eq!(args.env, "dev");
        assert_eq!(args.project_dir, PathBuf::from("."));
        assert!(args.config.is_none());
        assert!(!args.no_emulator);
        assert!(!args.sync_only);
    }

    #[test]
    fn flags_parse() {
        let args = CliArgs::try_parse_from([
            "devwatch",
            "--env",
            "staging",
            "--no-emulator",
            "--no-color",
            "--log-level",
            "debug",
            "--project-dir",
            "/work/functions",
        ])
        .unwrap();
        assert_eq!(args.env, "staging");
        assert!(args.no_emulator);
        assert!(!args.color_enabled());
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn sync_only_conflicts_with_dry_run() {
        assert!(CliArgs::try_parse_from(["devwatch", "--sync-only", "--dry-run"]).is_err());
    }
}
