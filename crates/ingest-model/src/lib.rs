//! Ingestion model types
//!
//! Plain records exchanged between the ingestion core and the collaborators
//! that consume its output (UI rendering, AI analysis, selection history).
//! Nothing in this crate touches the filesystem.

pub mod manifest;
pub mod path;
pub mod reason;
pub mod record;
pub mod summary;

pub use manifest::{ArchiveManifest, ManifestEntry};
pub use path::{normalize_entry_path, PathError};
pub use reason::{ErrorKind, LimitKind, RejectReason};
pub use record::{HistoryRecord, SourceKind};
pub use summary::{DirectorySummary, LargestFile, StructurePattern, TruncationReason, NO_EXTENSION};
