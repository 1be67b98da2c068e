//! Session source kind and the history record emitted on `Ready`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the submitted tree came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Archive bytes uploaded by the user and expanded by the core
    UploadedArchive,
    /// Existing directory picked by the user, analyzed in place
    DirectSelection,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UploadedArchive => write!(f, "uploaded_archive"),
            Self::DirectSelection => write!(f, "direct_selection"),
        }
    }
}

/// Opaque record handed to the recent-selections collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Archive file name or selected directory path
    pub path_reference: String,

    pub source_kind: SourceKind,

    pub timestamp: DateTime<Utc>,

    pub file_count: u64,

    pub total_size_bytes: u64,
}
