// src/lib.rs

pub mod cancel;
pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod project;
pub mod supervisor;
pub mod tasks;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::cli::CliArgs;
use crate::config::{default_config_path, load_or_default, ConfigFile};
use crate::console::{Color, ConsoleSink, LogSink, TaskLogger};
use crate::errors::DevwatchError;
use crate::exec::{literal_marker, SpawnSpec};
use crate::fs::{FileSystem, RealFileSystem};
use crate::supervisor::{Supervisor, SupervisorOptions, TaskLaunch};
use crate::tasks::{BuildWatchTask, DirSyncOptions, DirSyncTask, SubprocessTask};

pub const SYNC_TASK: &str = "sync";
pub const BUILD_TASK: &str = "tsc";
pub const EMULATOR_TASK: &str = "emulator";

/// Everything a run needs, resolved once from the CLI and config file and
/// then passed down explicitly.
#[derive(Debug, Clone)]
pub struct DevContext {
    /// Canonical functions directory.
    pub project_dir: PathBuf,
    pub env: String,
    pub color: bool,
    pub emulator_enabled: bool,
    pub config: ConfigFile,
}

impl DevContext {
    /// Load the config and verify the project directory.
    pub fn from_args(args: &CliArgs) -> crate::errors::Result<Self> {
        let config_path = default_config_path(&args.project_dir, args.config.as_deref());
        let config = load_or_default(&config_path)?;
        let project_dir = project::verify_functions_dir(&args.project_dir, &config.project)?;

        Ok(Self {
            project_dir,
            env: args.env.clone(),
            color: args.color_enabled(),
            emulator_enabled: !args.no_emulator,
            config,
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.sync.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.sync.output)
    }

    pub fn sync_options(&self) -> crate::errors::Result<DirSyncOptions> {
        let mut opts = DirSyncOptions::new(
            self.source_dir(),
            self.output_dir(),
            self.config.glob_spec()?,
        );
        opts.debounce = self.config.debounce();
        opts.flush_on_cancel = self.config.sync.flush_on_cancel;
        Ok(opts)
    }

    fn force_color(&self) -> &'static str {
        if self.color { "1" } else { "0" }
    }

    pub fn build_spec(&self) -> SpawnSpec {
        SpawnSpec::new(&self.config.build.program)
            .args(&self.config.build.args)
            .cwd(&self.project_dir)
            .env("FORCE_COLOR", self.force_color())
    }

    /// Configured extras first, so the fixed overrides always win.
    pub fn emulator_spec(&self) -> SpawnSpec {
        let mut spec = SpawnSpec::new(&self.config.emulator.program)
            .args(&self.config.emulator.args)
            .cwd(&self.project_dir);
        for (key, value) in &self.config.emulator.env {
            spec = spec.env(key, value);
        }
        spec.env("DEVWATCH_ENV", &self.env)
            .env("FORCE_COLOR", self.force_color())
    }

    fn logger(&self, tag: &str, color: Color, sink: &Arc<dyn LogSink>) -> TaskLogger {
        let color = self.color.then_some(color);
        TaskLogger::new(tag, color, Arc::clone(sink))
    }
}

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let ctx = DevContext::from_args(&args)?;
    info!(project_dir = %ctx.project_dir.display(), env = %ctx.env, "project verified");

    if args.dry_run {
        print_dry_run(&ctx);
        return Ok(supervisor::exit_code::CLEAN);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.sync_only {
        let opts = Arc::new(ctx.sync_options()?);
        let stats = tasks::dir_sync::reconcile_once(fs, opts)
            .await
            .context("one-shot sync failed")?;
        println!(
            "copied {} of {} matching files to {}",
            stats.copied,
            stats.matched,
            display_rel(&ctx.project_dir, &ctx.output_dir())
        );
        return Ok(supervisor::exit_code::CLEAN);
    }

    let sink: Arc<dyn LogSink> = Arc::new(ConsoleSink);
    let token = CancelToken::new();
    let supervisor = Supervisor::new(
        token.clone(),
        SupervisorOptions {
            startup_timeout: ctx.config.startup_timeout(),
        },
    )
    .with_console(ctx.logger("devwatch", Color::Cyan, &sink));
    // Before any task starts, so an early Ctrl-C still shuts down cleanly.
    let _signals = supervisor
        .install_signal_handlers()
        .context("failed to install signal handlers")?;

    let launches = build_launches(&ctx, &token, fs, &sink)?;

    let summary = supervisor.run(launches).await;
    let code = summary.exit_code();
    info!(reason = %summary.reason, exit_code = code, "devwatch finished");
    Ok(code)
}

/// Create every task and its readiness future, in registration order.
pub fn build_launches(
    ctx: &DevContext,
    token: &CancelToken,
    fs: Arc<dyn FileSystem>,
    sink: &Arc<dyn LogSink>,
) -> crate::errors::Result<Vec<TaskLaunch>> {
    let mut launches = Vec::new();

    let sync = Arc::new(DirSyncTask::new(
        SYNC_TASK,
        ctx.sync_options()?,
        fs,
        token.clone(),
        Some(ctx.logger(SYNC_TASK, Color::Green, sink)),
    ));
    let starter = Arc::clone(&sync);
    launches.push(TaskLaunch::new(sync, async move {
        starter.start().await.map(|_| ())
    }));

    if ctx.config.build.enabled {
        let first_build = Regex::new(&ctx.config.build.ready_pattern)
            .map_err(|e| DevwatchError::Config(format!("[build].ready_pattern: {e}")))?;
        let build = Arc::new(BuildWatchTask::new(
            BUILD_TASK,
            ctx.build_spec(),
            first_build,
            token.clone(),
            Some(ctx.logger(BUILD_TASK, Color::Blue, sink)),
        ));
        let starter = Arc::clone(&build);
        launches.push(TaskLaunch::new(build, async move { starter.start().await }));
    } else {
        debug!("build watch disabled");
    }

    if ctx.emulator_enabled {
        let marker_text = ctx.config.emulator.ready_marker.clone();
        let emulator = Arc::new(SubprocessTask::new(
            EMULATOR_TASK,
            ctx.emulator_spec(),
            literal_marker(&marker_text)?,
            token.clone(),
            Some(ctx.logger(EMULATOR_TASK, Color::Magenta, sink)),
        ));
        let starter = Arc::clone(&emulator);
        launches.push(TaskLaunch::new(emulator, async move {
            let ready = starter.start()?;
            if !ready.await {
                return Err(DevwatchError::NotReady(format!(
                    "output ended before '{marker_text}'"
                )));
            }
            // Only exits after readiness count as runtime failures.
            starter.spawn_exit_monitor();
            Ok::<(), DevwatchError>(())
        }));
    } else {
        debug!("emulator disabled");
    }

    Ok(launches)
}

fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Print the resolved configuration without starting anything.
fn print_dry_run(ctx: &DevContext) {
    let cfg = &ctx.config;
    println!("devwatch dry-run");
    println!("  project_dir = {}", ctx.project_dir.display());
    println!("  env = {}", ctx.env);
    println!("  color = {}", ctx.color);
    println!();

    println!("{SYNC_TASK}:");
    println!("    source: {}", cfg.sync.source.display());
    println!("    output: {}", cfg.sync.output.display());
    println!("    include: {:?}", cfg.sync.include);
    if !cfg.sync.exclude.is_empty() {
        println!("    exclude: {:?}", cfg.sync.exclude);
    }
    println!("    debounce_ms: {}", cfg.sync.debounce_ms);
    if cfg.sync.flush_on_cancel {
        println!("    flush_on_cancel: true");
    }

    if cfg.build.enabled {
        println!("{BUILD_TASK}:");
        println!("    cmd: {} {}", cfg.build.program, cfg.build.args.join(" "));
        println!("    ready_pattern: {}", cfg.build.ready_pattern);
    } else {
        println!("{BUILD_TASK}: disabled");
    }

    if ctx.emulator_enabled {
        println!("{EMULATOR_TASK}:");
        println!("    cmd: {} {}", cfg.emulator.program, cfg.emulator.args.join(" "));
        println!("    ready_marker: {}", cfg.emulator.ready_marker);
        for (k, v) in &cfg.emulator.env {
            println!("    env: {k}={v}");
        }
    } else {
        println!("{EMULATOR_TASK}: disabled");
    }

    println!();
    println!("startup_timeout_ms = {}", cfg.supervisor.startup_timeout_ms);
    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(color: bool) -> DevContext {
        let mut config = ConfigFile::default();
        config.emulator.env.insert("GCLOUD_PROJECT".into(), "demo".into());
        config.emulator.env.insert("DEVWATCH_ENV".into(), "ignored".into());
        DevContext {
            project_dir: PathBuf::from("/work/functions"),
            env: "staging".to_string(),
            color,
            emulator_enabled: true,
            config,
        }
    }

    #[test]
    fn emulator_env_has_fixed_overrides() {
        let spec = ctx(true).emulator_spec();
        assert_eq!(spec.env.get("DEVWATCH_ENV").map(String::as_str), Some("staging"));
        assert_eq!(spec.env.get("FORCE_COLOR").map(String::as_str), Some("1"));
        assert_eq!(spec.env.get("GCLOUD_PROJECT").map(String::as_str), Some("demo"));

        let spec = ctx(false).emulator_spec();
        assert_eq!(spec.env.get("FORCE_COLOR").map(String::as_str), Some("0"));
    }

    #[test]
    fn sync_paths_are_under_project_dir() {
        let ctx = ctx(false);
        let opts = ctx.sync_options().unwrap();
        assert_eq!(opts.source, PathBuf::from("/work/functions/src"));
        assert_eq!(opts.output, PathBuf::from("/work/functions/lib"));
        assert_eq!(opts.debounce.as_millis(), 25);
    }

    #[test]
    fn build_launches_registers_enabled_tasks_in_order() {
        let mut ctx = ctx(false);
        let token = CancelToken::new();
        let sink: Arc<dyn LogSink> = Arc::new(crate::console::MemorySink::new());

        let launches =
            build_launches(&ctx, &token, Arc::new(RealFileSystem), &sink).unwrap();
        let names: Vec<&str> = launches.iter().map(|l| l.task.name()).collect();
        assert_eq!(names, vec![SYNC_TASK, BUILD_TASK, EMULATOR_TASK]);

        ctx.emulator_enabled = false;
        ctx.config.build.enabled = false;
        let launches =
            build_launches(&ctx, &token, Arc::new(RealFileSystem), &sink).unwrap();
        assert_eq!(launches.len(), 1);
    }
}
