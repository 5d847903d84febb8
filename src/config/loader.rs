// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up in the project directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Devwatch.toml";

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Read, deserialize and validate a config file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    ConfigFile::try_from(raw)
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            ConfigFile::try_from(RawConfigFile::default())
        }
        _ => load_and_validate(path),
    }
}

/// Resolve the config path: relative paths are taken from `project_dir`.
pub fn default_config_path(project_dir: &Path, config: Option<&Path>) -> PathBuf {
    let file = config.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        project_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DevwatchError;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_or_default(dir.path().join("Devwatch.toml")).unwrap();
        assert_eq!(cfg.sync.debounce_ms, 25);
        assert_eq!(cfg.build.program, "tsc");
        assert_eq!(cfg.emulator.ready_marker, "All emulators ready");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Devwatch.toml");
        fs::write(&path, "[sync]\ndebounce_ms = 50\n\n[build]\nenabled = false\n").unwrap();

        let cfg = load_or_default(&path).unwrap();
        assert_eq!(cfg.sync.debounce_ms, 50);
        assert!(!cfg.build.enabled);
        assert_eq!(cfg.sync.source, PathBuf::from("src"));
        assert_eq!(cfg.supervisor.startup_timeout_ms, 20_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Devwatch.toml");
        fs::write(&path, "[sync]\ndebounce = 50\n").unwrap();

        assert!(matches!(load_or_default(&path), Err(DevwatchError::Toml(_))));
    }

    #[test]
    fn relative_config_resolves_against_project_dir() {
        let project = Path::new("/work/functions");
        assert_eq!(
            default_config_path(project, None),
            PathBuf::from("/work/functions/Devwatch.toml")
        );
        assert_eq!(
            default_config_path(project, Some(Path::new("alt.toml"))),
            PathBuf::from("/work/functions/alt.toml")
        );
        assert_eq!(
            default_config_path(project, Some(Path::new("/etc/devwatch.toml"))),
            PathBuf::from("/etc/devwatch.toml")
        );
    }
}
