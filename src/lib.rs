//! Codebase ingestion
//!
//! Accepts an untrusted zip archive (or a directly selected folder),
//! checks that it is safe to expand, expands it into an isolated working
//! directory under fixed ceilings, and summarizes the resulting tree.
//!
//! ```text
//! archive bytes → ArchiveValidator → BoundedExtractor → TreeAnalyzer → Ready
//! ```

pub mod analyze;
pub mod archive;
pub mod cancel;
pub mod config;
pub mod extract;
pub mod history;
pub mod obs;
pub mod session;

#[cfg(test)]
mod testutil;

pub use analyze::{AnalyzeOptions, TreeAnalyzer};
pub use archive::{ArchiveValidator, ValidationVerdict};
pub use cancel::CancelToken;
pub use config::{EffectiveConfig, IngestConfig, IngestLimits};
pub use extract::{BoundedExtractor, ExtractionError, ExtractionProgress, ReadOnlyRoot, WorkingDirectory};
pub use history::{JsonFileHistory, MemoryHistory, SelectionHistory};
pub use session::{IngestionSession, Ingestor, SessionError, SessionPhase, SessionSlot};

pub use ingest_model::{
    ArchiveManifest, DirectorySummary, ErrorKind, HistoryRecord, LimitKind, ManifestEntry,
    RejectReason, SourceKind,
};
