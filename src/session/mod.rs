//! Ingestion sessions
//!
//! One [`IngestionSession`] per submission. The [`Ingestor`] drives it
//! through validation, extraction and analysis, and either leaves it
//! `Ready` with a read-only root and a summary, or `Failed` with every
//! filesystem artifact already removed.

mod selection;
mod state;

pub use state::{SessionPhase, TerminalState};

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ingest_model::{ArchiveManifest, DirectorySummary, ErrorKind, HistoryRecord, RejectReason, SourceKind};
use serde::Serialize;
use uuid::Uuid;

use crate::analyze::{ExcludeError, TreeAnalyzer};
use crate::archive::ArchiveValidator;
use crate::cancel::{CancelToken, Interruption};
use crate::config::IngestConfig;
use crate::extract::{BoundedExtractor, ExtractionError, ProgressFn, ReadOnlyRoot, WorkingDirectory};
use crate::history::SelectionHistory;
use crate::obs::{self, SessionSpan};

/// Errors that end a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("archive rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("invalid selection {path}: {reason}")]
    InvalidSelection { path: PathBuf, reason: String },

    #[error("ingestion cancelled")]
    Cancelled,

    #[error("session deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
}

impl SessionError {
    /// Stable kind for callers; `None` only for internal state errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rejected(reason) => Some(reason.kind()),
            Self::Extraction(err) => Some(err.kind()),
            Self::InvalidSelection { .. } => Some(ErrorKind::InvalidSelection),
            Self::Cancelled => Some(ErrorKind::Cancelled),
            Self::DeadlineExceeded => Some(ErrorKind::DeadlineExceeded),
            Self::InvalidTransition { .. } => None,
        }
    }
}

impl From<Interruption> for SessionError {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Where a session's tree lives
#[derive(Debug)]
enum SessionRoot {
    /// Expanded archive, deleted with the session
    Owned(WorkingDirectory),
    /// User's own folder, never deleted
    Borrowed(PathBuf),
}

impl SessionRoot {
    fn path(&self) -> &Path {
        match self {
            Self::Owned(workdir) => workdir.path(),
            Self::Borrowed(path) => path,
        }
    }
}

/// One submission and everything derived from it
#[derive(Debug)]
pub struct IngestionSession {
    id: String,
    source_kind: SourceKind,
    path_reference: String,
    phase: SessionPhase,
    root: Option<SessionRoot>,
    manifest: Option<ArchiveManifest>,
    summary: Option<DirectorySummary>,
    failure: Option<SessionError>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IngestionSession {
    fn new(source_kind: SourceKind, path_reference: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            source_kind,
            path_reference,
            phase: SessionPhase::Created,
            root: None,
            manifest: None,
            summary: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    /// Archive file name or selected directory
    pub fn path_reference(&self) -> &str {
        &self.path_reference
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    /// Manifest of the validated archive (uploaded archives only)
    pub fn manifest(&self) -> Option<&ArchiveManifest> {
        self.manifest.as_ref()
    }

    /// Summary, once `Ready`
    pub fn summary(&self) -> Option<&DirectorySummary> {
        self.ready_field(self.summary.as_ref())
    }

    /// Read-only root, once `Ready`
    pub fn root(&self) -> Option<ReadOnlyRoot<'_>> {
        self.ready_field(self.root.as_ref())
            .map(|root| ReadOnlyRoot::new(root.path()))
    }

    /// The root, or the single top-level directory inside it when the
    /// tree has exactly one.
    pub fn analysis_root(&self) -> Option<PathBuf> {
        let root = self.root()?;
        match self.summary().and_then(|s| s.single_root.as_deref()) {
            Some(single) => root.join(single),
            None => Some(root.path().to_path_buf()),
        }
    }

    fn ready_field<'a, T>(&self, field: Option<&'a T>) -> Option<&'a T> {
        if self.is_ready() {
            field
        } else {
            None
        }
    }

    /// Keep an expanded archive on disk after the session ends.
    ///
    /// Returns `None` for failed sessions, which have nothing left to keep.
    pub fn persist(mut self) -> Option<PathBuf> {
        match self.root.take()? {
            SessionRoot::Owned(workdir) => Some(workdir.persist()),
            SessionRoot::Borrowed(path) => Some(path),
        }
    }

    /// End the session now, deleting an owned working directory.
    pub fn discard(mut self) {
        if let Some(SessionRoot::Owned(workdir)) = self.root.take() {
            // release logs the outcome
            let _ = workdir.release();
        }
    }

    fn transition(&mut self, target: SessionPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(target, self.source_kind) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        obs::emit_session_transition(&self.id, &self.phase, &target);
        self.phase = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn fail(&mut self, error: SessionError) {
        if let Some(SessionRoot::Owned(workdir)) = self.root.take() {
            let _ = workdir.release();
        }
        self.root = None;
        self.summary = None;

        let kind = error
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "INTERNAL".to_string());
        obs::emit_session_failed(&self.id, &kind, &error);

        if self.phase.can_transition_to(SessionPhase::Failed, self.source_kind) {
            obs::emit_session_transition(&self.id, &self.phase, &SessionPhase::Failed);
            self.phase = SessionPhase::Failed;
            self.updated_at = Utc::now();
        }
        self.failure = Some(error);
    }

    fn history_record(&self) -> Option<HistoryRecord> {
        let summary = self.summary()?;
        Some(HistoryRecord {
            path_reference: self.path_reference.clone(),
            source_kind: self.source_kind,
            timestamp: Utc::now(),
            file_count: summary.file_count,
            total_size_bytes: summary.total_size_bytes,
        })
    }

    /// Plain record for printing or handing to the UI
    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.id.clone(),
            source_kind: self.source_kind,
            path_reference: self.path_reference.clone(),
            phase: self.phase,
            created_at: self.created_at,
            updated_at: self.updated_at,
            working_directory: self.root().map(|r| r.path().display().to_string()),
            analysis_root: self.analysis_root().map(|p| p.display().to_string()),
            summary: self.summary().cloned(),
            error: self.failure.as_ref().map(|e| FailureReport {
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub source_kind: SourceKind,
    pub path_reference: String,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DirectorySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// Runs the pipeline for each submission.
///
/// Holds only read-only configuration plus the history collaborator, so
/// sessions created by one ingestor share no mutable state. The ingestor's
/// own [`CancelToken`] stops every session; a handle from
/// [`Ingestor::cancel_handle`] stops only the session it is passed to.
pub struct Ingestor {
    config: IngestConfig,
    validator: ArchiveValidator,
    analyzer: TreeAnalyzer,
    cancel: CancelToken,
    history: Option<Mutex<Box<dyn SelectionHistory>>>,
    on_progress: Option<ProgressFn>,
}

impl Ingestor {
    /// Fails only when an exclude pattern does not parse.
    pub fn new(config: IngestConfig) -> Result<Self, ExcludeError> {
        Ok(Self {
            validator: ArchiveValidator::new(config.limits.clone()),
            analyzer: TreeAnalyzer::new(config.analysis.clone())?,
            config,
            cancel: CancelToken::new(),
            history: None,
            on_progress: None,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_history(mut self, history: Box<dyn SelectionHistory>) -> Self {
        self.history = Some(Mutex::new(history));
        self
    }

    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn validator(&self) -> &ArchiveValidator {
        &self.validator
    }

    /// Recent selections, newest first; empty without a history
    pub fn recent_selections(&self) -> Vec<HistoryRecord> {
        let Some(history) = &self.history else {
            return Vec::new();
        };
        match history.lock() {
            Ok(history) => history.recent().unwrap_or_else(|e| {
                obs::emit_history_error(&e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    /// Token for cancelling a single session; also stops when the
    /// ingestor-wide token does.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.child()
    }

    /// Validate, expand and analyze an uploaded archive.
    pub fn ingest_archive(&self, file_name: &str, bytes: &[u8], declared_size: u64) -> IngestionSession {
        self.ingest_archive_with(file_name, bytes, declared_size, &self.cancel_handle())
    }

    /// [`Ingestor::ingest_archive`], stoppable through `handle`.
    pub fn ingest_archive_with(
        &self,
        file_name: &str,
        bytes: &[u8],
        declared_size: u64,
        handle: &CancelToken,
    ) -> IngestionSession {
        let mut session = IngestionSession::new(SourceKind::UploadedArchive, file_name.to_string());
        let _span = SessionSpan::enter(&session.id);
        obs::emit_session_created(&session.id, session.source_kind);

        let token = self.session_token(handle);
        match self.run_archive(&mut session, bytes, declared_size, &token) {
            Ok(()) => self.finish(&mut session),
            Err(err) => session.fail(err),
        }
        session
    }

    /// Analyze a directory the user picked, in place.
    pub fn select_directory(&self, path: &Path) -> IngestionSession {
        self.select_directory_with(path, &self.cancel_handle())
    }

    /// [`Ingestor::select_directory`], stoppable through `handle`.
    pub fn select_directory_with(&self, path: &Path, handle: &CancelToken) -> IngestionSession {
        let mut session =
            IngestionSession::new(SourceKind::DirectSelection, path.display().to_string());
        let _span = SessionSpan::enter(&session.id);
        obs::emit_session_created(&session.id, session.source_kind);

        let token = self.session_token(handle);
        match self.run_selection(&mut session, path, &token) {
            Ok(()) => self.finish(&mut session),
            Err(err) => session.fail(err),
        }
        session
    }

    fn session_token(&self, handle: &CancelToken) -> CancelToken {
        let token = handle.linked_with(&self.cancel);
        match self.config.deadline {
            Some(deadline) => token.with_deadline(deadline),
            None => token,
        }
    }

    fn run_archive(
        &self,
        session: &mut IngestionSession,
        bytes: &[u8],
        declared_size: u64,
        token: &CancelToken,
    ) -> Result<(), SessionError> {
        session.transition(SessionPhase::Validating)?;
        token.check()?;
        let manifest = self.validator.validate(bytes, declared_size).into_result()?;

        session.transition(SessionPhase::Extracting)?;
        let mut extractor =
            BoundedExtractor::new(self.config.limits.clone(), self.config.workdir.clone())
                .with_cancel(token.clone());
        if let Some(callback) = &self.on_progress {
            extractor = extractor.with_progress(callback.clone());
        }
        let workdir = extractor.extract(&manifest, bytes)?;
        session.root = Some(SessionRoot::Owned(workdir));
        session.manifest = Some(manifest);

        self.analyze(session, token)
    }

    fn run_selection(
        &self,
        session: &mut IngestionSession,
        path: &Path,
        token: &CancelToken,
    ) -> Result<(), SessionError> {
        session.transition(SessionPhase::Validating)?;
        token.check()?;
        let canonical = selection::check_selection(path, &self.config.selection).map_err(
            |reason| SessionError::InvalidSelection {
                path: path.to_path_buf(),
                reason,
            },
        )?;
        session.path_reference = canonical.display().to_string();
        session.root = Some(SessionRoot::Borrowed(canonical));

        self.analyze(session, token)
    }

    fn analyze(&self, session: &mut IngestionSession, token: &CancelToken) -> Result<(), SessionError> {
        session.transition(SessionPhase::Analyzing)?;
        token.check()?;

        let summary = match &session.root {
            Some(root) => self.analyzer.analyze(root.path()),
            None => DirectorySummary::default(),
        };
        session.summary = Some(summary);

        token.check()?;
        session.transition(SessionPhase::Ready)
    }

    fn finish(&self, session: &mut IngestionSession) {
        if let Some(summary) = session.summary() {
            obs::emit_session_ready(
                &session.id,
                summary.file_count,
                summary.total_size_bytes,
                summary.truncated,
            );
        }

        let (Some(history), Some(record)) = (&self.history, session.history_record()) else {
            return;
        };
        match history.lock() {
            Ok(mut history) => {
                if let Err(e) = history.record(record) {
                    obs::emit_history_error(&e);
                }
            }
            Err(_) => obs::emit_history_error(&"history lock poisoned"),
        }
    }
}

/// Holds the current session for one UI session; a new submission
/// replaces (and releases) the previous one.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<IngestionSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&IngestionSession> {
        self.current.as_ref()
    }

    pub fn replace(&mut self, session: IngestionSession) -> &IngestionSession {
        if let Some(previous) = self.current.take() {
            previous.discard();
        }
        self.current.insert(session)
    }

    /// Release the current session, e.g. when the hosting UI session ends.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.discard();
        }
    }
}
