//! Rejection reasons and error kinds
//!
//! The error kinds are stable identifiers surfaced to callers; the UI maps
//! them to user-facing text via [`ErrorKind::user_message`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which resource ceiling was exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Number of archive entries
    EntryCount,
    /// Sum of uncompressed sizes (or bytes actually written)
    TotalUncompressedSize,
    /// Uncompressed / compressed ratio of a single entry
    ExpansionRatio,
    /// A single entry expanded past its recorded size
    EntrySize,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryCount => write!(f, "entry count"),
            Self::TotalUncompressedSize => write!(f, "total uncompressed size"),
            Self::ExpansionRatio => write!(f, "expansion ratio"),
            Self::EntrySize => write!(f, "entry size"),
        }
    }
}

/// Stable error kinds for every failure the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedArchive,
    CorruptEntry,
    PathTraversal,
    ResourceLimitExceeded,
    SizeMismatch,
    IoFailure,
    Cancelled,
    DeadlineExceeded,
    InvalidSelection,
}

impl ErrorKind {
    /// Short text suitable for showing to the submitting user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MalformedArchive => "unreadable archive",
            Self::CorruptEntry => "archive contains a corrupt entry",
            Self::PathTraversal => "archive contains an unsafe path",
            Self::ResourceLimitExceeded => "archive exceeds a size limit",
            Self::SizeMismatch => "upload size does not match the archive",
            Self::IoFailure => "could not write the extracted files",
            Self::Cancelled => "ingestion was cancelled",
            Self::DeadlineExceeded => "ingestion took too long",
            Self::InvalidSelection => "selected folder cannot be used",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedArchive => "MALFORMED_ARCHIVE",
            Self::CorruptEntry => "CORRUPT_ENTRY",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::ResourceLimitExceeded => "RESOURCE_LIMIT_EXCEEDED",
            Self::SizeMismatch => "SIZE_MISMATCH",
            Self::IoFailure => "IO_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::InvalidSelection => "INVALID_SELECTION",
        };
        write!(f, "{}", s)
    }
}

/// Why an archive was rejected before anything was written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    #[error("malformed archive: {detail}")]
    MalformedArchive { detail: String },

    #[error("corrupt entry: {path}")]
    CorruptEntry { path: String },

    #[error("entry escapes the extraction root: {path}")]
    PathTraversal { path: String },

    #[error("{limit_kind} limit exceeded: observed {observed}, limit {limit}")]
    ResourceLimitExceeded {
        limit_kind: LimitKind,
        observed: u64,
        limit: u64,
    },

    #[error("declared size {declared} does not match archive size {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
}

impl RejectReason {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedArchive { .. } => ErrorKind::MalformedArchive,
            Self::CorruptEntry { .. } => ErrorKind::CorruptEntry,
            Self::PathTraversal { .. } => ErrorKind::PathTraversal,
            Self::ResourceLimitExceeded { .. } => ErrorKind::ResourceLimitExceeded,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }

    /// Path traversal attempts are security events and get logged apart
    /// from ordinary validation failures.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedArchive {
            detail: detail.into(),
        }
    }
}
