//! Typed, read-only settings derived from the merged configuration
//!
//! These are built once at startup and shared by reference; nothing in
//! the pipeline mutates them.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::BuiltinDefaults;
use crate::analyze::AnalyzeOptions;

/// Archive ceilings shared by the validator and the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_entries: u32,
    pub max_total_uncompressed: u64,
    pub max_expansion_ratio: u64,
    pub declared_size_tolerance: u64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            max_entries: u32::try_from(d.max_entries).unwrap_or(u32::MAX),
            max_total_uncompressed: d.max_total_uncompressed,
            max_expansion_ratio: d.max_expansion_ratio,
            declared_size_tolerance: d.declared_size_tolerance,
        }
    }
}

impl IngestLimits {
    pub fn with_max_entries(mut self, max_entries: u32) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_total_uncompressed(mut self, bytes: u64) -> Self {
        self.max_total_uncompressed = bytes;
        self
    }

    pub fn with_max_expansion_ratio(mut self, ratio: u64) -> Self {
        self.max_expansion_ratio = ratio;
        self
    }

    pub fn with_declared_size_tolerance(mut self, bytes: u64) -> Self {
        self.declared_size_tolerance = bytes;
        self
    }
}

/// Where working directories are created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdirSettings {
    /// Parent directory; the system temp dir when unset
    pub root: Option<PathBuf>,
    pub prefix: String,
}

impl Default for WorkdirSettings {
    fn default() -> Self {
        Self {
            root: None,
            prefix: BuiltinDefaults::default().workdir_prefix,
        }
    }
}

impl WorkdirSettings {
    pub fn parent_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Which directories may be submitted as a direct selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Empty means any readable directory is accepted
    pub allowed_roots: Vec<PathBuf>,
}

/// Everything the ingestion core reads from configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub limits: IngestLimits,
    pub analysis: AnalyzeOptions,
    pub workdir: WorkdirSettings,
    pub selection: SelectionPolicy,
    pub history_max_records: usize,
    pub deadline: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            limits: IngestLimits::default(),
            analysis: AnalyzeOptions::default(),
            workdir: WorkdirSettings::default(),
            selection: SelectionPolicy::default(),
            history_max_records: d.history_max_records as usize,
            deadline: None,
        }
    }
}
