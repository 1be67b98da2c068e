//! Exclusion rules for analysis
//!
//! Built-in excludes cover VCS metadata, dependency caches and build
//! output. They are off unless `analysis.default_excludes` is set;
//! `analysis.exclude` adds glob patterns on top.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Names skipped at any depth when default excludes are enabled
const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".vscode",
    ".idea",
    "dist",
    "build",
    "target",
    ".DS_Store",
    "Thumbs.db",
    ".pytest_cache",
    ".coverage",
    ".nyc_output",
    "coverage",
    ".next",
    ".nuxt",
    "vendor",
    "bower_components",
];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Exclusion rules matched against forward-slash relative paths
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    glob_set: GlobSet,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            glob_set: GlobSet::empty(),
        }
    }
}

impl ExcludeRules {
    pub fn new(default_excludes: bool, patterns: &[String]) -> Result<Self, ExcludeError> {
        let mut builder = GlobSetBuilder::new();

        if default_excludes {
            for name in DEFAULT_EXCLUDED_NAMES {
                builder.add(Glob::new(&format!("**/{}", name))?);
            }
        }

        for pattern in patterns {
            if !pattern.is_empty() {
                builder.add(Glob::new(pattern)?);
            }
        }

        Ok(Self {
            glob_set: builder.build()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.glob_set.is_empty()
    }

    /// Check if a relative path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.glob_set.is_match(path_str.as_ref())
    }
}
