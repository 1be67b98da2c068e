//! Structured log events for the ingestion pipeline.
//!
//! Every event carries an `event` field so log processors can filter on
//! it. The binary picks the filter from `INGEST_LOG` and switches to JSON
//! output when `INGEST_LOG_FORMAT=json`.

use std::fmt::Display;
use std::path::Path;

use ingest_model::{RejectReason, SourceKind};
use tracing::{debug, info, warn};

/// RAII guard that keeps the `ingest.session` span entered for a pipeline run.
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(session_id: &str) -> Self {
        let span = tracing::info_span!("ingest.session", session_id = %session_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_session_created(session_id: &str, source_kind: SourceKind) {
    info!(event = "session.created", session_id = %session_id, source_kind = %source_kind);
}

pub fn emit_session_transition(session_id: &str, from: &dyn Display, to: &dyn Display) {
    info!(
        event = "session.transition",
        session_id = %session_id,
        from = %from,
        to = %to,
    );
}

/// An entry that would land outside its root, caught at `stage`.
/// Always `warn` under its own event name so it can be alerted on.
pub fn emit_security_event(stage: &str, kind: &dyn Display, reason: &dyn Display) {
    warn!(
        event = "security.path_traversal",
        stage = stage,
        kind = %kind,
        reason = %reason,
    );
}

/// Validation rejection
pub fn emit_validation_rejected(reason: &RejectReason) {
    if reason.is_security_event() {
        emit_security_event("validation", &reason.kind(), reason);
    } else {
        info!(event = "validation.rejected", kind = %reason.kind(), reason = %reason);
    }
}

/// Extraction progress is a UI side channel; only visible at debug.
pub fn emit_extraction_progress(entries_done: u32, total_entries: u32, bytes_done: u64, total_bytes: u64) {
    debug!(
        event = "extraction.progress",
        entries_done = entries_done,
        total_entries = total_entries,
        bytes_done = bytes_done,
        total_bytes = total_bytes,
    );
}

pub fn emit_session_ready(session_id: &str, file_count: u64, total_size_bytes: u64, truncated: bool) {
    info!(
        event = "session.ready",
        session_id = %session_id,
        file_count = file_count,
        total_size_bytes = total_size_bytes,
        truncated = truncated,
    );
}

pub fn emit_session_failed(session_id: &str, kind: &dyn Display, error: &dyn Display) {
    info!(
        event = "session.failed",
        session_id = %session_id,
        kind = %kind,
        error = %error,
    );
}

pub fn emit_workdir_cleanup(path: &Path, removed: bool) {
    if removed {
        info!(event = "workdir.cleanup", path = %path.display(), removed = removed);
    } else {
        warn!(event = "workdir.cleanup", path = %path.display(), removed = removed);
    }
}

/// Failures of the recent-selections collaborator never fail a session.
pub fn emit_history_error(error: &dyn Display) {
    warn!(event = "history.error", error = %error);
}
