//! Bounded extraction
//!
//! Expands a validated archive into a fresh [`WorkingDirectory`]. The
//! manifest totals were already checked by the validator; the extractor
//! enforces the same ceilings again against the bytes it actually writes,
//! and re-checks every path right before creating it.

mod workdir;

pub use workdir::{ReadOnlyRoot, WorkingDirectory};

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ingest_model::{normalize_entry_path, ArchiveManifest, ErrorKind, LimitKind, ManifestEntry};
use zip::ZipArchive;

use crate::cancel::{CancelToken, Interruption};
use crate::config::{IngestLimits, WorkdirSettings};
use crate::obs;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Monotonic progress snapshot, emitted after every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionProgress {
    pub entries_done: u32,
    pub total_entries: u32,
    pub bytes_done: u64,
    pub total_bytes: u64,
}

/// Errors for extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("entry escapes the working directory: {path}")]
    PathTraversal { path: String },

    #[error("{limit_kind} limit exceeded during extraction: observed {observed}, limit {limit}")]
    ResourceLimitExceeded {
        limit_kind: LimitKind,
        observed: u64,
        limit: u64,
    },

    #[error("corrupt entry: {path}")]
    CorruptEntry { path: String },

    #[error("extraction cancelled")]
    Cancelled,

    #[error("deadline exceeded during extraction")]
    DeadlineExceeded,

    #[error("I/O failure at {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedArchive(_) => ErrorKind::MalformedArchive,
            Self::PathTraversal { .. } => ErrorKind::PathTraversal,
            Self::ResourceLimitExceeded { .. } => ErrorKind::ResourceLimitExceeded,
            Self::CorruptEntry { .. } => ErrorKind::CorruptEntry,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::IoFailure { .. } => ErrorKind::IoFailure,
        }
    }

    /// Traversal attempts get their own warn-level log event.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::IoFailure {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<Interruption> for ExtractionError {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Progress callback
pub type ProgressFn = Arc<dyn Fn(ExtractionProgress) + Send + Sync>;

/// Expands validated archives under fixed ceilings.
pub struct BoundedExtractor {
    limits: IngestLimits,
    workdir: WorkdirSettings,
    cancel: CancelToken,
    on_progress: Option<ProgressFn>,
}

impl BoundedExtractor {
    pub fn new(limits: IngestLimits, workdir: WorkdirSettings) -> Self {
        Self {
            limits,
            workdir,
            cancel: CancelToken::new(),
            on_progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Expand `bytes` according to `manifest`.
    ///
    /// On error the partially written directory is removed before
    /// returning.
    pub fn extract(
        &self,
        manifest: &ArchiveManifest,
        bytes: &[u8],
    ) -> Result<WorkingDirectory, ExtractionError> {
        self.cancel.check()?;

        let workdir = WorkingDirectory::create(&self.workdir)
            .map_err(|e| ExtractionError::io(&self.workdir.parent_dir(), e))?;

        match self.expand(manifest, bytes, workdir.path()) {
            Ok(()) => Ok(workdir),
            Err(err) => {
                if err.is_security_event() {
                    obs::emit_security_event("extraction", &err.kind(), &err);
                }
                // Cleanup failure is logged by release; the extraction
                // error is the one reported.
                let _ = workdir.release();
                Err(err)
            }
        }
    }

    fn expand(
        &self,
        manifest: &ArchiveManifest,
        bytes: &[u8],
        root: &Path,
    ) -> Result<(), ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::MalformedArchive(e.to_string()))?;

        let mut progress = ExtractionProgress {
            entries_done: 0,
            total_entries: manifest.entry_count,
            bytes_done: 0,
            total_bytes: manifest.total_uncompressed_size,
        };

        for entry in &manifest.entries {
            self.cancel.check()?;

            if progress.entries_done >= self.limits.max_entries {
                return Err(ExtractionError::ResourceLimitExceeded {
                    limit_kind: LimitKind::EntryCount,
                    observed: u64::from(progress.entries_done) + 1,
                    limit: u64::from(self.limits.max_entries),
                });
            }

            let target = resolve_inside(root, &entry.relative_path)?;

            if entry.is_directory {
                fs::create_dir_all(&target).map_err(|e| ExtractionError::io(&target, e))?;
            } else {
                self.write_file(&mut archive, entry, &target, &mut progress.bytes_done)?;
            }

            progress.entries_done += 1;
            self.report(progress);
        }

        Ok(())
    }

    fn write_file(
        &self,
        archive: &mut ZipArchive<Cursor<&[u8]>>,
        entry: &ManifestEntry,
        target: &Path,
        bytes_done: &mut u64,
    ) -> Result<(), ExtractionError> {
        let corrupt = || ExtractionError::CorruptEntry {
            path: entry.relative_path.clone(),
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractionError::io(parent, e))?;
        }

        let mut file = archive.by_index(entry.archive_index).map_err(|_| corrupt())?;
        if normalize_entry_path(file.name()).ok().as_deref() != Some(entry.relative_path.as_str()) {
            return Err(ExtractionError::MalformedArchive(format!(
                "entry {} does not match the manifest",
                entry.archive_index
            )));
        }

        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|e| ExtractionError::io(target, e))?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(corrupt()),
            };

            written += n as u64;
            if written > entry.uncompressed_size {
                return Err(ExtractionError::ResourceLimitExceeded {
                    limit_kind: LimitKind::EntrySize,
                    observed: written,
                    limit: entry.uncompressed_size,
                });
            }

            *bytes_done += n as u64;
            if *bytes_done > self.limits.max_total_uncompressed {
                return Err(ExtractionError::ResourceLimitExceeded {
                    limit_kind: LimitKind::TotalUncompressedSize,
                    observed: *bytes_done,
                    limit: self.limits.max_total_uncompressed,
                });
            }

            out.write_all(&buffer[..n])
                .map_err(|e| ExtractionError::io(target, e))?;

            self.cancel.check()?;
        }

        if written != entry.uncompressed_size {
            return Err(corrupt());
        }

        out.flush().map_err(|e| ExtractionError::io(target, e))?;
        Ok(())
    }

    fn report(&self, progress: ExtractionProgress) {
        obs::emit_extraction_progress(
            progress.entries_done,
            progress.total_entries,
            progress.bytes_done,
            progress.total_bytes,
        );
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}

/// Map a manifest path to its location under `root`, refusing anything
/// that could land outside it.
///
/// Runs immediately before each write, independently of the validator.
fn resolve_inside(root: &Path, relative_path: &str) -> Result<PathBuf, ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        path: relative_path.to_string(),
    };

    let normalized = normalize_entry_path(relative_path).map_err(|_| traversal())?;
    if normalized != relative_path {
        return Err(traversal());
    }

    let mut target = root.to_path_buf();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(segment) => target.push(segment),
            _ => return Err(traversal()),
        }
        // Only regular directories may sit between the root and the target.
        if let Ok(metadata) = fs::symlink_metadata(&target) {
            if metadata.file_type().is_symlink() {
                return Err(traversal());
            }
        }
    }

    if !target.starts_with(root) {
        return Err(traversal());
    }

    Ok(target)
}
