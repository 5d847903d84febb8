// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevwatchError, Result};
use crate::watch::GlobSpec;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_sync(cfg)?;
    validate_build(cfg)?;
    validate_emulator(cfg)?;
    validate_supervisor(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> DevwatchError {
    DevwatchError::Config(msg.into())
}

fn validate_sync(cfg: &RawConfigFile) -> Result<()> {
    let sync = &cfg.sync;
    if sync.include.is_empty() {
        return Err(config_error("[sync].include must list at least one pattern"));
    }
    GlobSpec::new(&sync.include, &sync.exclude)?;

    if sync.debounce_ms == 0 {
        return Err(config_error("[sync].debounce_ms must be >= 1 (got 0)"));
    }
    if sync.source == sync.output {
        return Err(config_error(format!(
            "[sync].source and [sync].output must differ (both '{}')",
            sync.source.display()
        )));
    }
    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.build.enabled {
        return Ok(());
    }
    if cfg.build.program.trim().is_empty() {
        return Err(config_error("[build].program must not be empty"));
    }
    Regex::new(&cfg.build.ready_pattern).map_err(|e| {
        config_error(format!(
            "[build].ready_pattern '{}' is not a valid regex: {e}",
            cfg.build.ready_pattern
        ))
    })?;
    Ok(())
}

fn validate_emulator(cfg: &RawConfigFile) -> Result<()> {
    if cfg.emulator.program.trim().is_empty() {
        return Err(config_error("[emulator].program must not be empty"));
    }
    if cfg.emulator.ready_marker.is_empty() {
        return Err(config_error("[emulator].ready_marker must not be empty"));
    }
    Ok(())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.supervisor.startup_timeout_ms == 0 {
        return Err(config_error(
            "[supervisor].startup_timeout_ms must be >= 1 (got 0)",
        ));
    }
    Ok(())
}
