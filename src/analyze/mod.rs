//! Directory analysis
//!
//! A bounded, read-only walk of an expanded archive or a directly
//! selected folder. Traversal order is deterministic (entries sorted by
//! name within each directory) so repeated runs over an unchanged tree
//! give identical summaries.
//!
//! Symlinks are never followed. Each one is counted as a single leaf,
//! whatever it points at.

mod exclude;
mod framework;
mod language;

pub use exclude::{ExcludeError, ExcludeRules};
pub use framework::{detect_frameworks, structure_patterns, ProjectLayout};
pub use language::language_for_extension;

use std::collections::BTreeSet;
use std::path::{Component, Path};

use ingest_model::{DirectorySummary, LargestFile, TruncationReason, NO_EXTENSION};
use walkdir::{DirEntry, WalkDir};

use crate::config::BuiltinDefaults;

/// Traversal bounds and filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Deepest level counted; 1 means only entries directly under the root
    pub max_depth: usize,

    /// Entries visited before the walk stops
    pub max_entries: u64,

    /// Cap on `sample_files`
    pub sample_files: usize,

    /// Skip VCS metadata, dependency caches and build output
    pub default_excludes: bool,

    /// Extra glob patterns, matched against forward-slash relative paths
    pub exclude: Vec<String>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            max_depth: d.analysis_max_depth as usize,
            max_entries: d.analysis_max_entries,
            sample_files: d.analysis_sample_files as usize,
            default_excludes: d.analysis_default_excludes,
            exclude: Vec::new(),
        }
    }
}

/// Computes a [`DirectorySummary`] for a directory tree
#[derive(Debug, Clone)]
pub struct TreeAnalyzer {
    options: AnalyzeOptions,
    excludes: ExcludeRules,
}

impl TreeAnalyzer {
    /// Fails only when an exclude pattern does not parse.
    pub fn new(options: AnalyzeOptions) -> Result<Self, ExcludeError> {
        let excludes = ExcludeRules::new(options.default_excludes, &options.exclude)?;
        Ok(Self { options, excludes })
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    /// Walk `root` and summarize it.
    ///
    /// Never fails: unreadable entries are counted, and hitting a bound
    /// marks the summary truncated.
    pub fn analyze(&self, root: impl AsRef<Path>) -> DirectorySummary {
        let root = root.as_ref();
        let mut summary = DirectorySummary::default();
        let mut top_level_dirs = BTreeSet::new();
        let mut layout = ProjectLayout::default();
        let mut visited: u64 = 0;

        // One level past the bound so truncation can be detected.
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(self.options.max_depth.saturating_add(1))
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        while let Some(result) = walker.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(_) => {
                    summary.unreadable_count += 1;
                    continue;
                }
            };

            if entry.depth() > self.options.max_depth {
                summary.mark_truncated(TruncationReason::MaxDepth);
                continue;
            }

            let relative = relative_path(root, entry.path());

            if !self.excludes.is_empty() && self.excludes.is_excluded(Path::new(&relative)) {
                summary.excluded_count += 1;
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if visited >= self.options.max_entries {
                summary.mark_truncated(TruncationReason::MaxEntries);
                break;
            }
            visited += 1;

            summary.max_depth_observed = summary.max_depth_observed.max(entry.depth());
            if entry.depth() == 1 {
                summary
                    .top_level_entries
                    .push(entry.file_name().to_string_lossy().to_string());
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                summary.symlink_count += 1;
                summary.file_count += 1;
            } else if file_type.is_dir() {
                summary.directory_count += 1;
                if entry.depth() == 1 {
                    top_level_dirs.insert(entry.file_name().to_string_lossy().to_string());
                }
                layout.dirs.push(relative);
            } else {
                layout.files.push(relative.clone());
                self.record_file(&mut summary, &entry, relative);
            }
        }

        if summary.top_level_entries.len() == 1 {
            let only = &summary.top_level_entries[0];
            if top_level_dirs.contains(only) {
                summary.single_root = Some(only.clone());
            }
        }

        if let Some(single) = &summary.single_root {
            layout = layout.rebased(single);
        }
        summary.frameworks = detect_frameworks(&layout);
        summary.structure_patterns = structure_patterns(&layout);

        summary
    }

    fn record_file(&self, summary: &mut DirectorySummary, entry: &DirEntry, relative: String) {
        summary.file_count += 1;

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                summary.unreadable_count += 1;
                0
            }
        };
        summary.total_size_bytes += size;

        let extension = extension_key(entry.path());
        if let Some(language) = language_for_extension(&extension) {
            *summary
                .language_histogram
                .entry(language.to_string())
                .or_insert(0) += 1;
        }
        *summary.extension_histogram.entry(extension).or_insert(0) += 1;

        let is_larger = summary
            .largest_file
            .as_ref()
            .map_or(true, |largest| size > largest.size_bytes);
        if is_larger {
            summary.largest_file = Some(LargestFile {
                path: relative.clone(),
                size_bytes: size,
            });
        }

        if summary.sample_files.len() < self.options.sample_files {
            summary.sample_files.push(relative);
        }
    }
}

/// Lowercased extension with its leading dot, or [`NO_EXTENSION`]
fn extension_key(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => NO_EXTENSION.to_string(),
    }
}

/// Forward-slash path of `path` relative to `root`
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
