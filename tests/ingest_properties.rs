//! End-to-end properties of the validate → extract → analyze pipeline
//!
//! Every test runs against a private scratch parent so leftover working
//! directories can be counted exactly.

mod fixtures;

use std::fs;

use codebase_ingest::{
    ArchiveValidator, ErrorKind, IngestConfig, IngestLimits, Ingestor, LimitKind, RejectReason,
    SessionError, SessionPhase, TreeAnalyzer,
};
use fixtures::{archive, config_in, entry_count, nested_project, sample_project, zip64_bomb, Entry};
use tempfile::tempdir;

fn validator() -> ArchiveValidator {
    ArchiveValidator::new(IngestLimits::default())
}

fn failure_kind(session: &codebase_ingest::IngestionSession) -> Option<ErrorKind> {
    session.failure().and_then(SessionError::kind)
}

// =============================================================================
// Test 1: Path traversal is rejected wherever it appears
// =============================================================================

#[test]
fn test_traversal_rejected_at_every_position() {
    let evil_names = ["../outside.txt", "src/../../etc/passwd", "/etc/passwd", "a/b/../../../x"];

    for evil in evil_names {
        for position in 0..=3 {
            let mut entries = vec![
                Entry::File("one.txt", b"1"),
                Entry::File("dir/two.txt", b"22"),
                Entry::File("dir/three.txt", b"333"),
            ];
            entries.insert(position, Entry::File(evil, b"pwned"));
            let bytes = archive(&entries);

            let verdict = validator().validate(&bytes, bytes.len() as u64);
            let reason = verdict.reason().unwrap_or_else(|| panic!("{} at {} accepted", evil, position));
            assert_eq!(
                reason.kind(),
                ErrorKind::PathTraversal,
                "{} at position {}: {}",
                evil,
                position,
                reason
            );
        }
    }
}

#[test]
fn test_outside_entry_creates_no_workdir() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = archive(&[Entry::File("../outside.txt", b"escape")]);

    let session = ingestor.ingest_archive("evil.zip", &bytes, bytes.len() as u64);

    assert_eq!(session.phase(), SessionPhase::Failed);
    assert_eq!(failure_kind(&session), Some(ErrorKind::PathTraversal));
    assert_eq!(entry_count(parent.path()), 0);
}

// =============================================================================
// Test 2: Resource ceilings are enforced before anything touches disk
// =============================================================================

#[test]
fn test_oversize_archive_writes_nothing() {
    let parent = tempdir().unwrap();
    let mut config = config_in(parent.path());
    config.limits = IngestLimits::default().with_max_total_uncompressed(1024);
    let ingestor = Ingestor::new(config).unwrap();

    let payload = vec![b'x'; 600];
    let bytes = archive(&[Entry::Stored("one.bin", &payload), Entry::Stored("two.bin", &payload)]);

    let session = ingestor.ingest_archive("big.zip", &bytes, bytes.len() as u64);

    match session.failure() {
        Some(SessionError::Rejected(RejectReason::ResourceLimitExceeded { limit_kind, observed, limit })) => {
            assert_eq!(*limit_kind, LimitKind::TotalUncompressedSize);
            assert_eq!(*observed, 1200);
            assert_eq!(*limit, 1024);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_zip64_bomb_rejected_before_decompression() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = zip64_bomb();

    let verdict = validator().validate(&bytes, bytes.len() as u64);
    assert_eq!(verdict.reason().map(RejectReason::kind), Some(ErrorKind::ResourceLimitExceeded));

    let session = ingestor.ingest_archive("bomb.zip", &bytes, bytes.len() as u64);
    assert_eq!(failure_kind(&session), Some(ErrorKind::ResourceLimitExceeded));
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_zip64_bomb_caught_by_ratio_alone() {
    let limits = IngestLimits::default().with_max_total_uncompressed(u64::MAX);
    let bytes = zip64_bomb();

    let verdict = ArchiveValidator::new(limits).validate(&bytes, bytes.len() as u64);

    match verdict.reason() {
        Some(RejectReason::ResourceLimitExceeded { limit_kind, observed, .. }) => {
            assert_eq!(*limit_kind, LimitKind::ExpansionRatio);
            // one compressed byte, so the ratio is the declared size
            assert_eq!(*observed, fixtures::BOMB_UNCOMPRESSED_SIZE);
        }
        other => panic!("unexpected verdict: {:?}", other),
    }
}

#[test]
fn test_declared_size_mismatch_rejected() {
    let bytes = sample_project();
    let verdict = validator().validate(&bytes, bytes.len() as u64 + 1_000_000);
    assert_eq!(verdict.reason().map(RejectReason::kind), Some(ErrorKind::SizeMismatch));
}

// =============================================================================
// Test 3: Round trip and concrete scenario
// =============================================================================

#[test]
fn test_sample_project_scenario() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = sample_project();

    let session = ingestor.ingest_archive("sample.zip", &bytes, bytes.len() as u64);

    assert!(session.is_ready(), "{:?}", session.failure());
    let summary = session.summary().unwrap();
    assert_eq!(summary.file_count, 3);
    assert_eq!(summary.directory_count, 2);
    assert_eq!(summary.total_size_bytes, 35);
    assert_eq!(summary.extension_histogram.get(".txt"), Some(&3));
    assert_eq!(summary.top_level_entries, vec!["a.txt", "b", "e"]);
    assert!(!summary.truncated);

    let root = session.root().unwrap();
    assert_eq!(fs::read(root.join("b/c.txt").unwrap()).unwrap(), vec![b'c'; 20]);
    assert!(root.join("e").unwrap().is_dir());
}

#[test]
fn test_round_trip_matches_manifest() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();

    for bytes in [sample_project(), nested_project()] {
        let session = ingestor.ingest_archive("project.zip", &bytes, bytes.len() as u64);
        assert!(session.is_ready(), "{:?}", session.failure());

        let manifest = session.manifest().unwrap();
        let summary = session.summary().unwrap();
        assert_eq!(summary.file_count, manifest.file_count());
        assert_eq!(summary.total_size_bytes, manifest.total_uncompressed_size);
    }
}

#[test]
fn test_nested_project_summary() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = nested_project();

    let session = ingestor.ingest_archive("app.zip", &bytes, bytes.len() as u64);
    let summary = session.summary().unwrap();

    assert_eq!(summary.single_root.as_deref(), Some("app"));
    assert_eq!(session.analysis_root().unwrap(), session.root().unwrap().join("app").unwrap());
    assert_eq!(summary.frameworks, vec!["Cargo"]);
    assert_eq!(summary.language_histogram.get("Rust"), Some(&2));
    assert_eq!(summary.language_histogram.get("TypeScript"), Some(&1));
    assert_eq!(summary.max_depth_observed, 3);
    assert_eq!(summary.largest_file.as_ref().map(|f| f.path.as_str()), Some("app/src/lib.rs"));
}

// =============================================================================
// Test 4: Idempotent analysis
// =============================================================================

#[test]
fn test_analysis_is_idempotent() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = nested_project();
    let session = ingestor.ingest_archive("app.zip", &bytes, bytes.len() as u64);
    let root = session.root().unwrap();

    let analyzer = TreeAnalyzer::new(IngestConfig::default().analysis).unwrap();
    let first = analyzer.analyze(root.path());
    let second = analyzer.analyze(root.path());

    assert_eq!(first, second);
    assert_eq!(&first, session.summary().unwrap());
}

// =============================================================================
// Test 5: Cleanup after any failure
// =============================================================================

#[test]
fn test_no_workdir_survives_failures() {
    let parent = tempdir().unwrap();
    let mut config = config_in(parent.path());
    config.limits = IngestLimits::default().with_max_entries(3);
    let ingestor = Ingestor::new(config).unwrap();

    let mut corrupt = archive(&[Entry::Stored("data.bin", b"hello world")]);
    let at = corrupt.windows(11).position(|w| w == b"hello world").unwrap();
    corrupt[at] ^= 0xFF;

    let failing: Vec<(&str, Vec<u8>)> = vec![
        ("garbage.zip", b"definitely not a zip".to_vec()),
        ("truncated.zip", sample_project()[..20].to_vec()),
        ("traversal.zip", archive(&[Entry::File("../x", b"x")])),
        ("too-many.zip", sample_project()),
        ("corrupt.zip", corrupt),
        ("bomb.zip", zip64_bomb()),
    ];

    for (name, bytes) in failing {
        let session = ingestor.ingest_archive(name, &bytes, bytes.len() as u64);
        assert_eq!(session.phase(), SessionPhase::Failed, "{}", name);
        assert!(session.root().is_none(), "{}", name);
        assert_eq!(entry_count(parent.path()), 0, "{} left a working directory", name);
    }
}

// =============================================================================
// Test 6: Symlinks stay opaque
// =============================================================================

#[cfg(unix)]
#[test]
fn test_escaping_symlink_is_single_leaf() {
    let outside = tempdir().unwrap();
    for i in 0..5 {
        fs::write(outside.path().join(format!("secret{}.txt", i)), b"top secret").unwrap();
    }

    let selected = tempdir().unwrap();
    fs::write(selected.path().join("main.py"), b"print('hi')\n").unwrap();
    std::os::unix::fs::symlink(outside.path(), selected.path().join("escape")).unwrap();

    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let session = ingestor.select_directory(selected.path());
    let summary = session.summary().unwrap();

    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.symlink_count, 1);
    assert_eq!(summary.directory_count, 0);
    assert_eq!(summary.total_size_bytes, 12);
    assert!(summary.top_level_entries.contains(&"escape".to_string()));
    assert!(summary.sample_files.iter().all(|p| !p.contains("secret")));
}

#[cfg(unix)]
#[test]
fn test_archived_symlink_is_written_as_plain_file() {
    let parent = tempdir().unwrap();
    let ingestor = Ingestor::new(config_in(parent.path())).unwrap();
    let bytes = archive(&[Entry::File("readme.txt", b"hi"), Entry::Symlink("passwd", "/etc/passwd")]);

    let session = ingestor.ingest_archive("links.zip", &bytes, bytes.len() as u64);
    assert!(session.is_ready(), "{:?}", session.failure());

    let link = session.root().unwrap().join("passwd").unwrap();
    let metadata = fs::symlink_metadata(&link).unwrap();
    assert!(metadata.file_type().is_file());
    assert_eq!(fs::read_to_string(&link).unwrap(), "/etc/passwd");
    assert_eq!(session.summary().unwrap().symlink_count, 0);
}
