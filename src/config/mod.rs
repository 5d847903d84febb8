// src/config/mod.rs

//! Optional `Devwatch.toml` configuration.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    BuildSection, ConfigFile, EmulatorSection, ProjectSection, RawConfigFile, SupervisorSection,
    SyncSection,
};
