//! Session lifecycle: history notifications, replacement, cancellation
//! and persistence.

mod fixtures;

use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codebase_ingest::{
    CancelToken, ErrorKind, IngestConfig, Ingestor, JsonFileHistory, SelectionHistory,
    SessionError, SessionPhase, SessionSlot, SourceKind,
};
use fixtures::{archive, config_in, entry_count, nested_project, sample_project, Entry};
use tempfile::tempdir;

// =============================================================================
// Test 1: Recent selections are recorded on Ready only
// =============================================================================

#[test]
fn test_history_file_records_ready_sessions() {
    let parent = tempdir().unwrap();
    let state = tempdir().unwrap();
    let history_path = state.path().join("recent.json");
    let ingestor = Ingestor::new(config_in(parent.path()))
        .unwrap()
        .with_history(Box::new(JsonFileHistory::new(&history_path, 20)));

    let good = sample_project();
    let bad = archive(&[Entry::File("../escape", b"x")]);
    let selected = tempdir().unwrap();
    fs::write(selected.path().join("main.go"), b"package main\n").unwrap();

    ingestor.ingest_archive("good.zip", &good, good.len() as u64);
    ingestor.ingest_archive("bad.zip", &bad, bad.len() as u64);
    ingestor.select_directory(selected.path());

    let recent = JsonFileHistory::new(&history_path, 20).recent().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].source_kind, SourceKind::DirectSelection);
    assert_eq!(recent[0].file_count, 1);
    assert_eq!(recent[1].path_reference, "good.zip");
    assert_eq!(recent[1].total_size_bytes, 35);
    assert_eq!(ingestor.recent_selections(), recent);
}

#[test]
fn test_unwritable_history_does_not_fail_session() {
    let parent = tempdir().unwrap();
    let blocker = parent.path().join("not-a-dir");
    fs::write(&blocker, b"").unwrap();
    let mut config = config_in(parent.path());
    config.workdir.root = Some(parent.path().join("work"));
    fs::create_dir(parent.path().join("work")).unwrap();

    let ingestor = Ingestor::new(config)
        .unwrap()
        .with_history(Box::new(JsonFileHistory::new(blocker.join("recent.json"), 20)));
    let bytes = sample_project();

    let session = ingestor.ingest_archive("a.zip", &bytes, bytes.len() as u64);
    assert!(session.is_ready());
    assert!(ingestor.recent_selections().is_empty());
}

// =============================================================================
// Test 2: One current session per slot
// =============================================================================

#[test]
fn test_new_submission_replaces_previous() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let mut slot = SessionSlot::new();

    let first = sample_project();
    let second = nested_project();

    let first_root = {
        let session = slot.replace(ingestor.ingest_archive("one.zip", &first, first.len() as u64));
        session.root().unwrap().path().to_path_buf()
    };
    assert!(first_root.exists());

    let session = slot.replace(ingestor.ingest_archive("two.zip", &second, second.len() as u64));
    assert_eq!(session.path_reference(), "two.zip");
    assert!(!first_root.exists());
    assert_eq!(entry_count(parent.path()), 1);

    slot.clear();
    assert!(slot.current().is_none());
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_failed_submission_still_replaces_previous() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let mut slot = SessionSlot::new();
    let good = sample_project();
    let bad = b"PK\x03\x04 nope".to_vec();

    slot.replace(ingestor.ingest_archive("good.zip", &good, good.len() as u64));
    let current = slot.replace(ingestor.ingest_archive("bad.zip", &bad, bad.len() as u64));

    assert_eq!(current.phase(), SessionPhase::Failed);
    assert_eq!(entry_count(parent.path()), 0);
}

// =============================================================================
// Test 3: Cancellation and deadlines
// =============================================================================

#[test]
fn test_cancel_during_extraction_leaves_nothing() {
    let parent = tempdir().unwrap();
    let token = CancelToken::new();
    let trigger = token.clone();
    let seen = Arc::new(AtomicU32::new(0));
    let counter = seen.clone();
    let ingestor = Ingestor::new(config_in(parent.path()))
        .unwrap()
        .with_cancel(token)
        .with_progress(Arc::new(move |progress| {
            counter.fetch_add(1, Ordering::SeqCst);
            if progress.entries_done >= 2 {
                trigger.cancel();
            }
        }));
    let bytes = nested_project();

    let session = ingestor.ingest_archive("app.zip", &bytes, bytes.len() as u64);

    assert_eq!(session.phase(), SessionPhase::Failed);
    assert_eq!(session.failure().and_then(SessionError::kind), Some(ErrorKind::Cancelled));
    assert!(seen.load(Ordering::SeqCst) >= 2);
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_cancelled_token_stops_direct_selection() {
    let parent = tempdir().unwrap();
    let selected = tempdir().unwrap();
    let token = CancelToken::new();
    token.cancel();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap().with_cancel(token);

    let session = ingestor.select_directory(selected.path());

    assert_eq!(session.failure().and_then(SessionError::kind), Some(ErrorKind::Cancelled));
    assert!(selected.path().exists());
}

#[test]
fn test_cancelling_one_session_spares_its_neighbour() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let handle = ingestor.cancel_handle();
    let trigger = handle.clone();
    let ingestor = ingestor.with_progress(Arc::new(move |_| trigger.cancel()));
    let first = nested_project();
    let second = sample_project();

    let (cancelled, ready) = std::thread::scope(|scope| {
        let a = scope.spawn(|| ingestor.ingest_archive_with("a.zip", &first, first.len() as u64, &handle));
        let b = scope.spawn(|| ingestor.ingest_archive("b.zip", &second, second.len() as u64));
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!(cancelled.failure().and_then(SessionError::kind), Some(ErrorKind::Cancelled));
    assert!(ready.is_ready());
    assert_eq!(ready.summary().unwrap().file_count, 3);
    assert_eq!(entry_count(parent.path()), 1);

    let later = ingestor.ingest_archive("c.zip", &second, second.len() as u64);
    assert!(later.is_ready());
}

#[test]
fn test_generous_deadline_does_not_interfere() {
    let parent = tempdir().unwrap();
    let config = IngestConfig {
        deadline: Some(Duration::from_secs(300)),
        ..config_in(parent.path())
    };
    let ingestor = Ingestor::new(config).unwrap();
    let bytes = sample_project();

    let session = ingestor.ingest_archive("a.zip", &bytes, bytes.len() as u64);
    assert!(session.is_ready());
}

// =============================================================================
// Test 4: Persisting a working directory
// =============================================================================

#[test]
fn test_persisted_workdir_outlives_session() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = sample_project();

    let session = ingestor.ingest_archive("a.zip", &bytes, bytes.len() as u64);
    let kept = session.persist().unwrap();

    assert!(kept.join("a.txt").is_file());
    assert_eq!(entry_count(parent.path()), 1);
    fs::remove_dir_all(&kept).unwrap();
}

#[test]
fn test_failed_session_has_nothing_to_persist() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = b"garbage".to_vec();

    let session = ingestor.ingest_archive("a.zip", &bytes, bytes.len() as u64);
    assert!(session.persist().is_none());
}

// =============================================================================
// Test 5: Reports
// =============================================================================

#[test]
fn test_ready_report_serializes_summary() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = sample_project();

    let session = ingestor.ingest_archive("a.zip", &bytes, bytes.len() as u64);
    let json = serde_json::to_value(session.report()).unwrap();

    assert_eq!(json["phase"], "READY");
    assert_eq!(json["source_kind"], "uploaded_archive");
    assert_eq!(json["summary"]["file_count"], 3);
    assert_eq!(json["summary"]["total_size_bytes"], 35);
    assert!(json.get("error").is_none());
    assert!(json["working_directory"].is_string());
}
