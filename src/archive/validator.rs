//! Pre-expansion archive checks
//!
//! Checks run in a fixed order and stop at the first failure:
//! format, integrity, path safety, resource ceilings, declared size.
//! Nothing here decompresses a deflated payload.

use std::collections::HashSet;
use std::io::{self, Cursor};

use ingest_model::{normalize_entry_path, ArchiveManifest, LimitKind, ManifestEntry, RejectReason};
use serde::Serialize;
use zip::{CompressionMethod, ZipArchive};

use crate::config::IngestLimits;
use crate::obs;

/// Outcome of validating one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum ValidationVerdict {
    Accepted(ArchiveManifest),
    Rejected(RejectReason),
}

impl ValidationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn manifest(&self) -> Option<&ArchiveManifest> {
        match self {
            Self::Accepted(manifest) => Some(manifest),
            Self::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<ArchiveManifest, RejectReason> {
        match self {
            Self::Accepted(manifest) => Ok(manifest),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

/// Central-directory view of one entry before its name is trusted
#[derive(Debug)]
struct RawEntry {
    index: usize,
    name: String,
    compressed_size: u64,
    uncompressed_size: u64,
    is_directory: bool,
    crc32: u32,
}

/// Inspects archive bytes against the configured ceilings.
///
/// Holds no per-archive state, so one validator can serve any number of
/// sessions.
#[derive(Debug, Clone, Default)]
pub struct ArchiveValidator {
    limits: IngestLimits,
}

impl ArchiveValidator {
    pub fn new(limits: IngestLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &IngestLimits {
        &self.limits
    }

    /// Validate `bytes`, whose size was declared by the uploader as
    /// `declared_size`.
    pub fn validate(&self, bytes: &[u8], declared_size: u64) -> ValidationVerdict {
        match self.check(bytes, declared_size) {
            Ok(manifest) => ValidationVerdict::Accepted(manifest),
            Err(reason) => {
                obs::emit_validation_rejected(&reason);
                ValidationVerdict::Rejected(reason)
            }
        }
    }

    fn check(&self, bytes: &[u8], declared_size: u64) -> Result<ArchiveManifest, RejectReason> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| RejectReason::malformed(e.to_string()))?;

        let raw_entries = check_integrity(&mut archive, bytes.len() as u64)?;
        let entries = check_paths(raw_entries)?;
        let manifest = ArchiveManifest::from_entries(entries);

        self.check_resources(&manifest, archive.len())?;
        self.check_declared_size(declared_size, bytes.len() as u64)?;

        Ok(manifest)
    }

    fn check_resources(
        &self,
        manifest: &ArchiveManifest,
        entry_count: usize,
    ) -> Result<(), RejectReason> {
        let limits = &self.limits;

        if entry_count as u64 > u64::from(limits.max_entries) {
            return Err(RejectReason::ResourceLimitExceeded {
                limit_kind: LimitKind::EntryCount,
                observed: entry_count as u64,
                limit: u64::from(limits.max_entries),
            });
        }

        if manifest.total_uncompressed_size > limits.max_total_uncompressed {
            return Err(RejectReason::ResourceLimitExceeded {
                limit_kind: LimitKind::TotalUncompressedSize,
                observed: manifest.total_uncompressed_size,
                limit: limits.max_total_uncompressed,
            });
        }

        for entry in manifest.entries.iter().filter(|e| !e.is_directory) {
            // A zero compressed size is treated as one byte.
            let compressed = entry.compressed_size.max(1);
            if entry.uncompressed_size > compressed.saturating_mul(limits.max_expansion_ratio) {
                return Err(RejectReason::ResourceLimitExceeded {
                    limit_kind: LimitKind::ExpansionRatio,
                    observed: entry.uncompressed_size / compressed,
                    limit: limits.max_expansion_ratio,
                });
            }
        }

        Ok(())
    }

    /// `actual` is the length of the bytes received; a zip's recorded
    /// sizes are already tied to that length by the integrity pass.
    fn check_declared_size(&self, declared: u64, actual: u64) -> Result<(), RejectReason> {
        if declared.abs_diff(actual) > self.limits.declared_size_tolerance {
            return Err(RejectReason::SizeMismatch { declared, actual });
        }
        Ok(())
    }
}

/// Read every entry's metadata and verify what can be verified without
/// inflating anything.
///
/// Stored entries have their CRC-32 checked here. Deflated entries only
/// get a data-range check; their CRC is verified while streaming during
/// extraction.
fn check_integrity(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    archive_len: u64,
) -> Result<Vec<RawEntry>, RejectReason> {
    let mut raw_entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let (raw, verify_stored) = {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| RejectReason::malformed(format!("entry {}: {}", index, e)))?;

            let name = file.name().to_string();

            let method = file.compression();
            if !matches!(method, CompressionMethod::Stored | CompressionMethod::Deflated) {
                return Err(RejectReason::malformed(format!(
                    "unsupported compression method {:?}: {}",
                    method, name
                )));
            }

            if file.data_start().saturating_add(file.compressed_size()) > archive_len {
                return Err(RejectReason::CorruptEntry { path: name });
            }

            let raw = RawEntry {
                index,
                name,
                compressed_size: file.compressed_size(),
                uncompressed_size: file.size(),
                is_directory: file.is_dir(),
                crc32: file.crc32(),
            };
            // Stored entries whose sizes disagree are left for the ratio
            // check and the extractor's runtime guard.
            let verify_stored = method == CompressionMethod::Stored
                && !raw.is_directory
                && raw.compressed_size == raw.uncompressed_size;
            (raw, verify_stored)
        };

        if verify_stored {
            let mut file = archive
                .by_index(index)
                .map_err(|e| RejectReason::malformed(format!("entry {}: {}", index, e)))?;
            io::copy(&mut file, &mut io::sink()).map_err(|_| RejectReason::CorruptEntry {
                path: raw.name.clone(),
            })?;
        }

        raw_entries.push(raw);
    }

    Ok(raw_entries)
}

/// Normalize every entry name.
///
/// All entries are scanned before anything else is reported, so a
/// traversal attempt anywhere in the list wins over an unrelated
/// malformed name earlier in it.
fn check_paths(raw_entries: Vec<RawEntry>) -> Result<Vec<ManifestEntry>, RejectReason> {
    let mut entries = Vec::with_capacity(raw_entries.len());
    let mut first_malformed: Option<RejectReason> = None;
    let mut seen = HashSet::new();

    for raw in raw_entries {
        let relative_path = match normalize_entry_path(&raw.name) {
            Ok(path) => path,
            Err(e) if e.is_traversal() => {
                return Err(RejectReason::PathTraversal { path: raw.name });
            }
            Err(e) => {
                first_malformed.get_or_insert_with(|| RejectReason::malformed(e.to_string()));
                continue;
            }
        };

        if !seen.insert(relative_path.clone()) {
            first_malformed.get_or_insert_with(|| {
                RejectReason::malformed(format!("duplicate entry: {}", relative_path))
            });
            continue;
        }

        entries.push(ManifestEntry {
            relative_path,
            compressed_size: raw.compressed_size,
            uncompressed_size: raw.uncompressed_size,
            is_directory: raw.is_directory,
            archive_index: raw.index,
            crc32: raw.crc32,
        });
    }

    if let Some(reason) = first_malformed {
        return Err(reason);
    }

    check_parents_are_directories(&entries)?;

    Ok(entries)
}

/// A file entry cannot also be the parent of another entry.
fn check_parents_are_directories(entries: &[ManifestEntry]) -> Result<(), RejectReason> {
    let files: HashSet<&str> = entries
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| e.relative_path.as_str())
        .collect();

    for entry in entries {
        let mut parent = entry.relative_path.as_str();
        while let Some((head, _)) = parent.rsplit_once('/') {
            if files.contains(head) {
                return Err(RejectReason::malformed(format!(
                    "entry {} is nested under file {}",
                    entry.relative_path, head
                )));
            }
            parent = head;
        }
    }

    Ok(())
}
