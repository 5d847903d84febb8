#![allow(dead_code)]

use std::path::Path;

use devwatch::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_include(mut self, pattern: &str) -> Self {
        self.config.sync.include.push(pattern.to_string());
        self
    }

    /// Replace the default include list.
    pub fn only_include(mut self, patterns: &[&str]) -> Self {
        self.config.sync.include = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.sync.exclude.push(pattern.to_string());
        self
    }

    pub fn with_dirs(mut self, source: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        self.config.sync.source = source.as_ref().to_path_buf();
        self.config.sync.output = output.as_ref().to_path_buf();
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_ms = ms;
        self
    }

    pub fn flush_on_cancel(mut self, flush: bool) -> Self {
        self.config.sync.flush_on_cancel = flush;
        self
    }

    pub fn without_build(mut self) -> Self {
        self.config.build.enabled = false;
        self
    }

    pub fn with_build(mut self, program: &str, args: &[&str], ready_pattern: &str) -> Self {
        self.config.build.enabled = true;
        self.config.build.program = program.to_string();
        self.config.build.args = args.iter().map(|a| a.to_string()).collect();
        self.config.build.ready_pattern = ready_pattern.to_string();
        self
    }

    pub fn with_emulator(mut self, program: &str, args: &[&str], marker: &str) -> Self {
        self.config.emulator.program = program.to_string();
        self.config.emulator.args = args.iter().map(|a| a.to_string()).collect();
        self.config.emulator.ready_marker = marker.to_string();
        self
    }

    pub fn with_startup_timeout_ms(mut self, ms: u64) -> Self {
        self.config.supervisor.startup_timeout_ms = ms;
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
