// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;
use crate::watch::GlobSpec;

/// Configuration as read from `Devwatch.toml`.
///
/// ```toml
/// [project]
/// root_package = "chatonfire"
/// functions_package = "functions"
///
/// [sync]
/// source = "src"
/// output = "lib"
/// include = ["views/**/*.ejs", "public/**/*"]
/// exclude = ["**/*.ts", "**/*.mts"]
///
/// [build]
/// program = "tsc"
///
/// [emulator]
/// program = "firebase"
/// ready_marker = "All emulators ready"
///
/// [supervisor]
/// startup_timeout_ms = 20000
/// ```
///
/// Every section is optional; a missing file is the same as an empty one.
/// This type has not been validated; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub emulator: EmulatorSection,
    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub sync: SyncSection,
    pub build: BuildSection,
    pub emulator: EmulatorSection,
    pub supervisor: SupervisorSection,
}

impl ConfigFile {
    /// Build from a raw config without running validation.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            sync: raw.sync,
            build: raw.build,
            emulator: raw.emulator,
            supervisor: raw.supervisor,
        }
    }

    /// Compile the sync include/exclude patterns.
    pub fn glob_spec(&self) -> Result<GlobSpec> {
        GlobSpec::new(&self.sync.include, &self.sync.exclude)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.sync.debounce_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.supervisor.startup_timeout_ms)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[project]`: package names used to recognise the functions directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default = "default_root_package")]
    pub root_package: String,
    #[serde(default = "default_functions_package")]
    pub functions_package: String,
}

fn default_root_package() -> String {
    "chatonfire".to_string()
}

fn default_functions_package() -> String {
    "functions".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            root_package: default_root_package(),
            functions_package: default_functions_package(),
        }
    }
}

/// `[sync]`: the source-to-output mirror.
///
/// `source` and `output` are relative to the project directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSection {
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Run pending copies on shutdown instead of dropping them.
    #[serde(default)]
    pub flush_on_cancel: bool,
}

fn default_source() -> PathBuf {
    PathBuf::from("src")
}

fn default_output() -> PathBuf {
    PathBuf::from("lib")
}

fn default_include() -> Vec<String> {
    vec!["views/**/*.ejs".to_string(), "public/**/*".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["**/*.ts".to_string(), "**/*.mts".to_string()]
}

fn default_debounce_ms() -> u64 {
    25
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            include: default_include(),
            exclude: default_exclude(),
            debounce_ms: default_debounce_ms(),
            flush_on_cancel: false,
        }
    }
}

/// `[build]`: the incremental compiler in watch mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_build_program")]
    pub program: String,
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,
    /// Regular expression matched against each output line; the first match
    /// means the first build has finished.
    #[serde(default = "default_ready_pattern")]
    pub ready_pattern: String,
}

fn default_true() -> bool {
    true
}

fn default_build_program() -> String {
    "tsc".to_string()
}

fn default_build_args() -> Vec<String> {
    ["--watch", "--preserveWatchOutput", "--outDir", "lib"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ready_pattern() -> String {
    "Watching for file changes".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_build_program(),
            args: default_build_args(),
            ready_pattern: default_ready_pattern(),
        }
    }
}

/// `[emulator]`: the managed backend emulator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulatorSection {
    #[serde(default = "default_emulator_program")]
    pub program: String,
    #[serde(default = "default_emulator_args")]
    pub args: Vec<String>,
    /// Literal text; matched as a substring of an output line.
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,
    /// Extra environment variables for the emulator process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_emulator_program() -> String {
    "firebase".to_string()
}

fn default_emulator_args() -> Vec<String> {
    ["emulators:start", "--only", "functions,firestore"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ready_marker() -> String {
    "All emulators ready".to_string()
}

impl Default for EmulatorSection {
    fn default() -> Self {
        Self {
            program: default_emulator_program(),
            args: default_emulator_args(),
            ready_marker: default_ready_marker(),
            env: BTreeMap::new(),
        }
    }
}

/// `[supervisor]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

fn default_startup_timeout_ms() -> u64 {
    20_000
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            startup_timeout_ms: default_startup_timeout_ms(),
        }
    }
}
