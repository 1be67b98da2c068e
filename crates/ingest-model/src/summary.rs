//! Directory summary
//!
//! Structural statistics for an analyzed tree. Derived data: it is
//! recomputed on demand and never treated as a source of truth.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Histogram key used for files without an extension
pub const NO_EXTENSION: &str = "(none)";

/// Why a traversal stopped short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// Directories deeper than the configured depth were not entered
    MaxDepth,
    /// The configured entry budget ran out
    MaxEntries,
}

/// Conventional project layout found at the top level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructurePattern {
    /// `src/`
    SourceDirectory,
    /// `test/` or `tests/`
    TestDirectory,
    /// `docs/` or `documentation/`
    DocumentationDirectory,
}

/// Largest regular file seen during traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestFile {
    pub path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    /// Regular files plus symlink leaves
    pub file_count: u64,

    pub directory_count: u64,

    pub total_size_bytes: u64,

    /// Lowercased extension (with leading dot) to file count
    pub extension_histogram: BTreeMap<String, u64>,

    /// Language name to file count, for recognised extensions
    pub language_histogram: BTreeMap<String, u64>,

    /// Names directly under the root, sorted
    pub top_level_entries: Vec<String>,

    /// First N files in traversal order, as forward-slash relative paths
    pub sample_files: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_file: Option<LargestFile>,

    /// Deepest level reached (1 = directly under the root)
    pub max_depth_observed: usize,

    /// Symlinks counted as opaque leaves
    pub symlink_count: u64,

    /// Entries skipped by exclude rules (subtrees count once)
    pub excluded_count: u64,

    /// Entries that could not be read
    pub unreadable_count: u64,

    /// Set when the top level is exactly one directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_root: Option<String>,

    /// Frameworks recognised from marker files, relative to the single
    /// root when there is one
    #[serde(default)]
    pub frameworks: Vec<String>,

    #[serde(default)]
    pub structure_patterns: Vec<StructurePattern>,

    /// Statistics are partial when set
    pub truncated: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationReason>,
}

impl DirectorySummary {
    /// Record a truncation, keeping the first reason seen
    pub fn mark_truncated(&mut self, reason: TruncationReason) {
        self.truncated = true;
        if self.truncation.is_none() {
            self.truncation = Some(reason);
        }
    }

    /// Extensions ordered by descending count, then name
    pub fn top_extensions(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut items: Vec<(&str, u64)> = self
            .extension_histogram
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        items.truncate(limit);
        items
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
