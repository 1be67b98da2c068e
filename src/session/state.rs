//! Session state machine
//!
//! Uploaded archive: CREATED → VALIDATING → EXTRACTING → ANALYZING → READY
//! Direct selection: CREATED → VALIDATING → ANALYZING → READY
//! Any non-terminal state may move to FAILED.

use ingest_model::SourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check if a state is terminal (no further transitions possible)
pub trait TerminalState {
    fn is_terminal(&self) -> bool;
}

/// Session phase enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Allocated, no I/O yet
    Created,
    /// Archive or selected path being checked
    Validating,
    /// Archive being expanded into the working directory
    Extracting,
    /// Tree being summarized
    Analyzing,
    /// Root and summary available to collaborators
    Ready,
    /// Stopped with an error; nothing is exposed
    Failed,
}

impl TerminalState for SessionPhase {
    fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Failed)
    }
}

impl SessionPhase {
    /// Check if transition from this phase to target is valid for a
    /// session fed by `source`
    pub fn can_transition_to(&self, target: SessionPhase, source: SourceKind) -> bool {
        match (self, target) {
            (SessionPhase::Created, SessionPhase::Validating) => true,

            (SessionPhase::Validating, SessionPhase::Extracting) => {
                source == SourceKind::UploadedArchive
            }
            // Direct selections have nothing to extract
            (SessionPhase::Validating, SessionPhase::Analyzing) => {
                source == SourceKind::DirectSelection
            }

            (SessionPhase::Extracting, SessionPhase::Analyzing) => true,
            (SessionPhase::Analyzing, SessionPhase::Ready) => true,

            (from, SessionPhase::Failed) => !from.is_terminal(),

            // Terminal states cannot transition
            _ => false,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Validating => "VALIDATING",
            Self::Extracting => "EXTRACTING",
            Self::Analyzing => "ANALYZING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}
