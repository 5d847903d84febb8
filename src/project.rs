// src/project.rs

//! Checks that devwatch was started from the functions package of the
//! expected project.
//!
//! The directory must be named after the functions package, contain a
//! `package.json` with that name, and sit next to a parent `package.json`
//! naming the root package.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::ProjectSection;
use crate::errors::{DevwatchError, Result};

/// Printed before the detailed error when verification fails.
pub const INVALID_DIRECTORY_HINT: &str =
    "Invalid directory. Project may have been renamed, or devwatch was started outside the functions directory.";

/// Verify `dir` and return its canonical path.
pub fn verify_functions_dir(dir: &Path, project: &ProjectSection) -> Result<PathBuf> {
    let dir = dir.canonicalize().map_err(|e| {
        DevwatchError::ProjectRoot(format!("cannot resolve '{}': {e}", dir.display()))
    })?;

    let basename = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if basename != project.functions_package {
        return Err(DevwatchError::ProjectRoot(format!(
            "expected directory named '{}', found '{}'",
            project.functions_package, basename
        )));
    }

    expect_package_name(&dir.join("package.json"), &project.functions_package)?;

    let parent = dir.parent().ok_or_else(|| {
        DevwatchError::ProjectRoot(format!("'{}' has no parent directory", dir.display()))
    })?;
    expect_package_name(&parent.join("package.json"), &project.root_package)?;

    Ok(dir)
}

fn expect_package_name(manifest: &Path, expected: &str) -> Result<()> {
    let text = fs::read_to_string(manifest).map_err(|e| {
        DevwatchError::ProjectRoot(format!("cannot read '{}': {e}", manifest.display()))
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        DevwatchError::ProjectRoot(format!("'{}' is not valid JSON: {e}", manifest.display()))
    })?;

    match value.get("name").and_then(Value::as_str) {
        Some(name) if name == expected => Ok(()),
        Some(name) => Err(DevwatchError::ProjectRoot(format!(
            "'{}' names package '{name}', expected '{expected}'",
            manifest.display()
        ))),
        None => Err(DevwatchError::ProjectRoot(format!(
            "'{}' has no string \"name\" field",
            manifest.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root_name: &str, functions_name: &str) -> (TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("package.json"),
            format!(r#"{{"name": "{root_name}", "private": true}}"#),
        )
        .unwrap();
        let functions = tmp.path().join("functions");
        fs::create_dir(&functions).unwrap();
        fs::write(
            functions.join("package.json"),
            format!(r#"{{"name": "{functions_name}"}}"#),
        )
        .unwrap();
        (tmp, functions)
    }

    #[test]
    fn accepts_expected_layout() {
        let (_tmp, functions) = layout("chatonfire", "functions");
        let dir = verify_functions_dir(&functions, &ProjectSection::default()).unwrap();
        assert!(dir.ends_with("functions"));
    }

    #[test]
    fn rejects_renamed_root_package() {
        let (_tmp, functions) = layout("renamed", "functions");
        let err = verify_functions_dir(&functions, &ProjectSection::default()).unwrap_err();
        match err {
            DevwatchError::ProjectRoot(msg) => assert!(msg.contains("expected 'chatonfire'")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_directory_name() {
        let (tmp, _functions) = layout("chatonfire", "functions");
        let err = verify_functions_dir(tmp.path(), &ProjectSection::default()).unwrap_err();
        assert!(matches!(err, DevwatchError::ProjectRoot(_)));
    }

    #[test]
    fn rejects_missing_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let functions = tmp.path().join("functions");
        fs::create_dir(&functions).unwrap();
        let err = verify_functions_dir(&functions, &ProjectSection::default()).unwrap_err();
        match err {
            DevwatchError::ProjectRoot(msg) => assert!(msg.contains("cannot read")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
