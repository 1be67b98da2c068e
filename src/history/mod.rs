//! Recent selections
//!
//! The session notifies a [`SelectionHistory`] once it reaches `Ready`.
//! The history owns its own storage; the ingestion core keeps no
//! selection state of its own.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ingest_model::HistoryRecord;
use serde::{Deserialize, Serialize};

/// Schema version for the history file
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "codebase-ingest/recent_selections@1";

/// Errors for history operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported history schema version {0}")]
    UnsupportedSchema(u32),
}

/// Receiver of `Ready` notifications
pub trait SelectionHistory: Send {
    /// Re-selecting a source already in the history moves it to the front.
    fn record(&mut self, record: HistoryRecord) -> Result<(), HistoryError>;

    /// Newest first
    fn recent(&self) -> Result<Vec<HistoryRecord>, HistoryError>;
}

fn same_source(a: &HistoryRecord, b: &HistoryRecord) -> bool {
    a.source_kind == b.source_kind && a.path_reference == b.path_reference
}

/// Process-local history, capped at `max_records`
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    records: VecDeque<HistoryRecord>,
    max_records: usize,
}

impl MemoryHistory {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SelectionHistory for MemoryHistory {
    fn record(&mut self, record: HistoryRecord) -> Result<(), HistoryError> {
        self.records.retain(|existing| !same_source(existing, &record));
        self.records.push_back(record);
        while self.records.len() > self.max_records {
            self.records.pop_front();
        }
        Ok(())
    }

    fn recent(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self.records.iter().rev().cloned().collect())
    }
}

/// On-disk layout, oldest record first
#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    schema_version: u32,
    schema_id: String,
    records: Vec<HistoryRecord>,
}

/// History persisted as a JSON document, rewritten atomically on every
/// record.
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
    max_records: usize,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>, max_records: usize) -> Self {
        Self {
            path: path.into(),
            max_records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let file: HistoryFile = serde_json::from_str(&json)?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(HistoryError::UnsupportedSchema(file.schema_version));
        }
        Ok(file.records)
    }

    fn store(&self, records: Vec<HistoryRecord>) -> Result<(), HistoryError> {
        let file = HistoryFile {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            records,
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)?;

        // Atomic rename
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}

impl SelectionHistory for JsonFileHistory {
    fn record(&mut self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut records = self.load()?;
        records.retain(|existing| !same_source(existing, &record));
        records.push(record);
        let excess = records.len().saturating_sub(self.max_records);
        records.drain(..excess);
        self.store(records)
    }

    fn recent(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records = self.load()?;
        records.reverse();
        Ok(records)
    }
}
