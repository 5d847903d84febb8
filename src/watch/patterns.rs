// src/watch/patterns.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{DevwatchError, Result};

/// Compiled include/exclude glob patterns.
///
/// Patterns are relative to the source root, and so are the paths passed to
/// [`GlobSpec::matches`] (e.g. `"public/css/site.css"`). A path matches when
/// it hits at least one include pattern and no exclude pattern, so excludes
/// always win.
///
/// The same `GlobSpec` drives both the initial reconciliation pass and the
/// live watcher filter.
#[derive(Clone)]
pub struct GlobSpec {
    include: Vec<String>,
    exclude: Vec<String>,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for GlobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobSpec")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

impl GlobSpec {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include)?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self {
            include: include.to_vec(),
            exclude: exclude.to_vec(),
            include_set,
            exclude_set,
        })
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|source| DevwatchError::Glob {
            pattern: pat.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| DevwatchError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GlobSpec {
        GlobSpec::new(
            &["views/**/*.ejs".into(), "public/**/*".into()],
            &["**/*.ts".into(), "**/*.mts".into()],
        )
        .unwrap()
    }

    #[test]
    fn exclude_beats_include() {
        let g = spec();
        assert!(g.matches("public/app.js"));
        assert!(g.matches("public/img/logo.png"));
        assert!(!g.matches("public/app.mts"));
        assert!(!g.matches("public/lib/util.ts"));
    }

    #[test]
    fn only_included_trees_match() {
        let g = spec();
        assert!(g.matches("views/index.ejs"));
        assert!(g.matches("views/partials/head.ejs"));
        assert!(!g.matches("views/index.html"));
        assert!(!g.matches("routes/api.js"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = GlobSpec::new(&["public/[".into()], &[]).unwrap_err();
        match err {
            DevwatchError::Glob { pattern, .. } => assert_eq!(pattern, "public/["),
            other => panic!("expected Glob error, got {other:?}"),
        }
    }
}
