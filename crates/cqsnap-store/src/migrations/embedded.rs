//! Embedded SQL migrations

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_snapshots",
            sql: include_str!("../../migrations/001_snapshots.sql"),
        },
        Migration {
            id: "002_snapshot_triggers",
            sql: include_str!("../../migrations/002_snapshot_triggers.sql"),
        },
        Migration {
            id: "003_updated_at_guard",
            sql: include_str!("../../migrations/003_updated_at_guard.sql"),
        },
    ]
}
