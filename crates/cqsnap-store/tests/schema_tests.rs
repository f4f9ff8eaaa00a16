// Schema constraints and triggers of the snapshots table

use cqsnap_core::{SnapshotIdentity, SnapshotLanguage};
use cqsnap_store::migrations::apply_migrations;
use cqsnap_store::{InsertOutcome, SnapshotRepo};
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    let mut conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    apply_migrations(&mut conn).expect("Migrations should apply");
    conn
}

fn identity(category: Option<&str>) -> SnapshotIdentity {
    SnapshotIdentity::new(
        "https://example.com/repo.git",
        "main",
        "c0ffee",
        SnapshotLanguage::Java,
        category.map(str::to_string),
    )
    .unwrap()
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_tables_created() {
    let conn = setup_test_db();
    assert_eq!(table_names(&conn), vec!["schema_version", "snapshots"]);
}

#[test]
fn test_identity_columns_are_write_once() {
    let conn = setup_test_db();
    let id = identity(None);
    SnapshotRepo::insert(&conn, &id, None).unwrap();
    let zeros = "0".repeat(64);

    for (column, value) in [
        ("project_url", "https://evil.example/repo.git"),
        ("commit_sha", "deadbeef"),
        ("language", "PYTHON"),
        ("category", "other"),
        ("source_id", zeros.as_str()),
        ("created_at", "2000-01-01T00:00:00.000Z"),
    ] {
        let sql = format!("UPDATE snapshots SET {} = ?1 WHERE global_id = ?2", column);
        let err = conn
            .execute(&sql, rusqlite::params![value, id.global_id()])
            .unwrap_err();
        assert!(
            err.to_string().contains("write-once"),
            "update of {} should abort, got {}",
            column,
            err
        );
    }
}

#[test]
fn test_state_update_refreshes_updated_at() {
    let conn = setup_test_db();
    let id = identity(None);
    SnapshotRepo::insert(&conn, &id, None).unwrap();
    let before = SnapshotRepo::find_by_id(&conn, &id.global_id())
        .unwrap()
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    SnapshotRepo::update_state(&conn, &id.global_id(), cqsnap_core::SnapshotState::BuildFailed)
        .unwrap();

    let after = SnapshotRepo::find_by_id(&conn, &id.global_id())
        .unwrap()
        .unwrap();
    assert!(after.updated_at() > before.updated_at());
    assert_eq!(after.created_at(), before.created_at());
}

#[test]
fn test_updated_at_is_not_client_settable() {
    let conn = setup_test_db();
    let id = identity(None);
    SnapshotRepo::insert(&conn, &id, None).unwrap();
    let before = SnapshotRepo::find_by_id(&conn, &id.global_id())
        .unwrap()
        .unwrap();

    let err = conn
        .execute(
            "UPDATE snapshots SET updated_at = '1999-01-01T00:00:00.000Z' WHERE global_id = ?1",
            [id.global_id()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("maintained by the store"), "got {}", err);

    // Smuggled in alongside a state change
    let err = conn
        .execute(
            "UPDATE snapshots SET state = 'BUILD_FAILED', updated_at = '1999-01-01T00:00:00.000Z'
             WHERE global_id = ?1",
            [id.global_id()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("maintained by the store"), "got {}", err);

    let after = SnapshotRepo::find_by_id(&conn, &id.global_id())
        .unwrap()
        .unwrap();
    assert_eq!(after.updated_at(), before.updated_at());
    assert_eq!(after.state(), before.state());
}

#[test]
fn test_unknown_state_rejected() {
    let conn = setup_test_db();
    let id = identity(None);
    SnapshotRepo::insert(&conn, &id, None).unwrap();

    let result = conn.execute(
        "UPDATE snapshots SET state = 'BUILDING' WHERE global_id = ?1",
        [id.global_id()],
    );
    assert!(result.is_err());
}

#[test]
fn test_identity_unique_with_absent_category() {
    let conn = setup_test_db();
    let id = identity(None);

    assert_eq!(
        SnapshotRepo::insert(&conn, &id, None).unwrap(),
        InsertOutcome::Inserted
    );
    assert_eq!(
        SnapshotRepo::insert(&conn, &id, Some("batch-1")).unwrap(),
        InsertOutcome::AlreadyExists
    );

    let with_category = identity(Some("nightly"));
    assert_eq!(
        SnapshotRepo::insert(&conn, &with_category, None).unwrap(),
        InsertOutcome::Inserted
    );

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
