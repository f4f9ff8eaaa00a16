// Claim and reconcile transactions of the snapshot repository

use cqsnap_core::{Outcome, SnapshotIdentity, SnapshotLanguage, SnapshotState, Stage};
use cqsnap_store::db::{self, begin_locked, LockMode, DEFAULT_LOCK_TIMEOUT};
use cqsnap_store::migrations::apply_migrations;
use cqsnap_store::{ClaimFilter, ReconcileResult, SnapshotRepo};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.db");
    let mut conn = db::open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
    apply_migrations(&mut conn).unwrap();
    (dir, path)
}

fn connect(path: &Path) -> Connection {
    db::open(path, DEFAULT_LOCK_TIMEOUT).unwrap()
}

fn register(conn: &Connection, commit: &str, lang: SnapshotLanguage, label: Option<&str>) -> String {
    let id = SnapshotIdentity::new("https://example.com/repo.git", "main", commit, lang, None)
        .unwrap();
    SnapshotRepo::insert(conn, &id, label).unwrap();
    id.global_id()
}

fn state_of(conn: &Connection, global_id: &str) -> SnapshotState {
    SnapshotRepo::find_by_id(conn, global_id)
        .unwrap()
        .unwrap()
        .state()
}

#[test]
fn test_claim_moves_row_to_in_progress() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    let id = register(&conn, "c1", SnapshotLanguage::Java, None);

    let claimed = SnapshotRepo::claim(
        &mut conn,
        Stage::Build,
        &ClaimFilter::default(),
        DEFAULT_LOCK_TIMEOUT,
    )
    .unwrap()
    .unwrap();

    assert_eq!(claimed.global_id(), id);
    assert_eq!(claimed.state(), SnapshotState::BuildInProgress);
    assert_eq!(state_of(&conn, &id), SnapshotState::BuildInProgress);
}

#[test]
fn test_claim_nothing_to_do() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    register(&conn, "c1", SnapshotLanguage::Java, None);

    let analyze = SnapshotRepo::claim(
        &mut conn,
        Stage::Analyze,
        &ClaimFilter::default(),
        DEFAULT_LOCK_TIMEOUT,
    )
    .unwrap();
    assert!(analyze.is_none());

    let retry = ClaimFilter {
        retry: true,
        ..ClaimFilter::default()
    };
    assert!(
        SnapshotRepo::claim(&mut conn, Stage::Build, &retry, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_claim_respects_label_and_id() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    let unlabelled = register(&conn, "c1", SnapshotLanguage::Java, None);
    let labelled = register(&conn, "c2", SnapshotLanguage::Java, Some("batch-7"));

    let by_label = ClaimFilter {
        label: Some("batch-7".to_string()),
        ..ClaimFilter::default()
    };
    let claimed = SnapshotRepo::claim(&mut conn, Stage::Build, &by_label, DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();
    assert_eq!(claimed.global_id(), labelled);
    assert_eq!(claimed.label(), Some("batch-7"));

    assert!(
        SnapshotRepo::claim(&mut conn, Stage::Build, &by_label, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .is_none()
    );

    let by_id = ClaimFilter {
        global_id: Some(unlabelled.clone()),
        ..ClaimFilter::default()
    };
    assert_eq!(by_id.lock_mode(), LockMode::Wait);
    let claimed = SnapshotRepo::claim(&mut conn, Stage::Build, &by_id, DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();
    assert_eq!(claimed.global_id(), unlabelled);
}

#[test]
fn test_retry_claims_failed_only() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    let failed = register(&conn, "c1", SnapshotLanguage::Java, None);
    let stuck = register(&conn, "c2", SnapshotLanguage::Java, None);
    SnapshotRepo::update_state(&conn, &failed, SnapshotState::BuildFailed).unwrap();
    SnapshotRepo::update_state(&conn, &stuck, SnapshotState::BuildInProgress).unwrap();

    let retry = ClaimFilter {
        retry: true,
        ..ClaimFilter::default()
    };
    let claimed = SnapshotRepo::claim(&mut conn, Stage::Build, &retry, DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();
    assert_eq!(claimed.global_id(), failed);

    assert!(
        SnapshotRepo::claim(&mut conn, Stage::Build, &retry, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .is_none()
    );
    assert_eq!(state_of(&conn, &stuck), SnapshotState::BuildInProgress);
}

/// Hold the write lock on a separate connection for `hold`
fn hold_lock(path: &Path, hold: Duration) -> thread::JoinHandle<()> {
    let path = path.to_path_buf();
    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = thread::spawn(move || {
        let mut conn = connect(&path);
        let tx = begin_locked(&mut conn, LockMode::Wait, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .unwrap();
        locked_tx.send(()).unwrap();
        thread::sleep(hold);
        tx.commit().unwrap();
    });
    locked_rx.recv().unwrap();
    holder
}

#[test]
fn test_claim_waits_out_a_short_writer() {
    let (_dir, path) = setup();
    let mut worker = connect(&path);
    let id = register(&worker, "c1", SnapshotLanguage::Java, None);

    let holder = hold_lock(&path, Duration::from_millis(200));
    let claimed = SnapshotRepo::claim(
        &mut worker,
        Stage::Build,
        &ClaimFilter::default(),
        DEFAULT_LOCK_TIMEOUT,
    )
    .unwrap()
    .unwrap();
    holder.join().unwrap();

    assert_eq!(claimed.global_id(), id);
    assert_eq!(state_of(&worker, &id), SnapshotState::BuildInProgress);
}

#[test]
fn test_explicit_claim_fails_after_lock_timeout() {
    let (_dir, path) = setup();
    let mut holder = connect(&path);
    let mut worker = connect(&path);
    let id = register(&holder, "c1", SnapshotLanguage::Java, None);

    let held = begin_locked(&mut holder, LockMode::Wait, DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();

    let explicit = ClaimFilter {
        global_id: Some(id.clone()),
        ..ClaimFilter::default()
    };
    let waited = SnapshotRepo::claim(&mut worker, Stage::Build, &explicit, Duration::from_millis(50));
    assert_eq!(waited.unwrap_err().code(), "ERR_PERSISTENCE");

    held.rollback().unwrap();
    let claimed = SnapshotRepo::claim(&mut worker, Stage::Build, &explicit, DEFAULT_LOCK_TIMEOUT)
        .unwrap();
    assert!(claimed.is_some());
}

#[test]
fn test_reconcile_outlasts_lock_timeout() {
    let (_dir, path) = setup();
    let mut worker = connect(&path);
    let id = register(&worker, "c1", SnapshotLanguage::Java, None);
    SnapshotRepo::claim(&mut worker, Stage::Build, &ClaimFilter::default(), DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();

    let holder = hold_lock(&path, Duration::from_millis(800));
    let result = SnapshotRepo::reconcile(
        &mut worker,
        Stage::Build,
        &id,
        Outcome::Succeeded,
        Duration::from_millis(100),
    )
    .unwrap();
    holder.join().unwrap();

    assert_eq!(
        result,
        ReconcileResult::Written {
            from: SnapshotState::BuildInProgress,
            to: SnapshotState::NotAnalyzed,
        }
    );
    assert_eq!(state_of(&worker, &id), SnapshotState::NotAnalyzed);
}

#[test]
fn test_concurrent_claims_exactly_one_wins() {
    let (_dir, path) = setup();
    let id = register(&connect(&path), "c1", SnapshotLanguage::Java, None);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let barrier = barrier.clone();
            let path = path.clone();
            let id = id.clone();
            thread::spawn(move || {
                let mut conn = connect(&path);
                let filter = ClaimFilter {
                    global_id: Some(id),
                    ..ClaimFilter::default()
                };
                barrier.wait();
                SnapshotRepo::claim(&mut conn, Stage::Build, &filter, DEFAULT_LOCK_TIMEOUT)
                    .unwrap()
                    .is_some()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(wins, 1);
}

#[test]
fn test_reconcile_writes_outcome_state() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    let id = register(&conn, "c1", SnapshotLanguage::Java, None);
    SnapshotRepo::claim(&mut conn, Stage::Build, &ClaimFilter::default(), DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();

    let result =
        SnapshotRepo::reconcile(&mut conn, Stage::Build, &id, Outcome::Failed, DEFAULT_LOCK_TIMEOUT)
            .unwrap();

    assert_eq!(
        result,
        ReconcileResult::Written {
            from: SnapshotState::BuildInProgress,
            to: SnapshotState::BuildFailed,
        }
    );
    assert_eq!(state_of(&conn, &id), SnapshotState::BuildFailed);
}

#[test]
fn test_reconcile_vanished_row_is_not_an_error() {
    let (_dir, path) = setup();
    let mut conn = connect(&path);
    let id = register(&conn, "c1", SnapshotLanguage::Java, None);
    SnapshotRepo::claim(&mut conn, Stage::Build, &ClaimFilter::default(), DEFAULT_LOCK_TIMEOUT)
        .unwrap()
        .unwrap();
    SnapshotRepo::delete(&conn, &id).unwrap();

    let result = SnapshotRepo::reconcile(
        &mut conn,
        Stage::Build,
        &id,
        Outcome::Succeeded,
        DEFAULT_LOCK_TIMEOUT,
    )
    .unwrap();
    assert_eq!(result, ReconcileResult::Vanished);
}

#[test]
fn test_list_and_source_sharing() {
    let (_dir, path) = setup();
    let conn = connect(&path);
    let java = register(&conn, "c1", SnapshotLanguage::Java, None);
    let python = register(&conn, "c1", SnapshotLanguage::Python, None);
    let other = register(&conn, "c2", SnapshotLanguage::Java, None);

    let all = SnapshotRepo::list(&conn).unwrap();
    assert_eq!(all.len(), 3);
    let first = all[0].clone();
    assert!(all.iter().all(|s| s.created_at() >= first.created_at()));

    let java_row = SnapshotRepo::find_by_id(&conn, &java).unwrap().unwrap();
    assert_eq!(
        SnapshotRepo::count_sharing_source(&conn, java_row.source_id(), &java).unwrap(),
        1
    );
    SnapshotRepo::delete(&conn, &python).unwrap();
    assert_eq!(
        SnapshotRepo::count_sharing_source(&conn, java_row.source_id(), &java).unwrap(),
        0
    );
    assert!(SnapshotRepo::find_by_id(&conn, &other).unwrap().is_some());
}
