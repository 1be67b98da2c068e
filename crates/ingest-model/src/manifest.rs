//! Archive manifest
//!
//! Entry metadata derived from an archive's directory without expanding
//! any payload. Only archives that passed validation get a manifest, and
//! every path in it is already normalized.

use serde::{Deserialize, Serialize};

/// A single entry of a validated archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized forward-slash path relative to the extraction root
    pub relative_path: String,

    /// Stored (compressed) payload size in bytes
    pub compressed_size: u64,

    /// Size after expansion as recorded by the archive
    pub uncompressed_size: u64,

    /// Whether the entry is a directory marker
    pub is_directory: bool,

    /// Position of the entry inside the archive
    pub archive_index: usize,

    /// CRC-32 recorded by the archive
    pub crc32: u32,
}

/// Ordered entry list plus totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Entries in archive order
    pub entries: Vec<ManifestEntry>,

    /// Sum of `uncompressed_size` over all entries
    pub total_uncompressed_size: u64,

    /// Sum of `compressed_size` over all entries
    pub total_compressed_size: u64,

    /// Number of entries
    pub entry_count: u32,
}

impl ArchiveManifest {
    /// Build a manifest, computing the totals from the entries.
    ///
    /// Totals saturate rather than wrap.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        let total_uncompressed_size = entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.uncompressed_size));
        let total_compressed_size = entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.compressed_size));
        let entry_count = u32::try_from(entries.len()).unwrap_or(u32::MAX);

        Self {
            entries,
            total_uncompressed_size,
            total_compressed_size,
            entry_count,
        }
    }

    /// Number of non-directory entries
    pub fn file_count(&self) -> u64 {
        self.entries.iter().filter(|e| !e.is_directory).count() as u64
    }

    /// Look up an entry by its normalized path
    pub fn get(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.relative_path == relative_path)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
