//! Database connection management
//!
//! SQLite has no row locks, so the metadata store serialises writers with
//! `BEGIN IMMEDIATE`. Every writer holds the write lock only for a few
//! statements: claims, reconciles and registrations keep archiving, uploads
//! and engine runs outside their transactions.

use crate::errors::{from_rusqlite, is_busy, lock_timeout as lock_timeout_error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Default time a writer waits for the lock in [`LockMode::Wait`]
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest a [`LockMode::SkipLocked`] claim waits out another writer
pub const CLAIM_BUSY_WAIT: Duration = Duration::from_secs(2);

/// Shortest wait per attempt in [`LockMode::Block`]
const MIN_BLOCK_WAIT: Duration = Duration::from_millis(100);

const SQLITE_SCHEME: &str = "sqlite://";

/// How a locked transaction behaves when another writer holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Wait out short transactions, at most [`CLAIM_BUSY_WAIT`] or the lock
    /// timeout if shorter; a store still busy reads as "nothing available"
    SkipLocked,
    /// Block up to the lock timeout, then fail
    Wait,
    /// Block until the lock is taken, warning after each lock timeout
    Block,
}

/// Strip an optional `sqlite://` prefix from a connection string
pub fn database_path(connection_string: &str) -> &Path {
    Path::new(
        connection_string
            .strip_prefix(SQLITE_SCHEME)
            .unwrap_or(connection_string),
    )
}

/// Open and configure a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path).map_err(from_rusqlite)?;
    configure(&conn, lock_timeout)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(from_rusqlite)?;
    configure(&conn, DEFAULT_LOCK_TIMEOUT)?;
    Ok(conn)
}

/// Apply connection settings
pub fn configure(conn: &Connection, lock_timeout: Duration) -> Result<()> {
    conn.busy_timeout(lock_timeout).map_err(from_rusqlite)?;

    conn.execute_batch("PRAGMA foreign_keys = ON")
        .map_err(from_rusqlite)?;

    // journal_mode returns a row, so it cannot go through execute()
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .map_err(from_rusqlite)?;

    Ok(())
}

/// Begin a write transaction holding the database write lock
///
/// Returns `Ok(None)` when `mode` is [`LockMode::SkipLocked`] and the lock
/// stayed busy. In [`LockMode::Wait`] a lock that stays busy past
/// `lock_timeout` is a `Persistence` error. [`LockMode::Block`] never gives
/// up on a busy lock.
pub fn begin_locked(
    conn: &mut Connection,
    mode: LockMode,
    lock_timeout: Duration,
) -> Result<Option<Transaction<'_>>> {
    let wait = match mode {
        LockMode::SkipLocked => CLAIM_BUSY_WAIT.min(lock_timeout),
        LockMode::Wait => lock_timeout,
        LockMode::Block => lock_timeout.max(MIN_BLOCK_WAIT),
    };
    // The &mut receiver keeps callers from nesting transactions
    let conn: &Connection = conn;
    let mut attempts: u32 = 0;

    loop {
        conn.busy_timeout(wait).map_err(from_rusqlite)?;
        let begun = Transaction::new_unchecked(conn, TransactionBehavior::Immediate);
        conn.busy_timeout(lock_timeout).map_err(from_rusqlite)?;

        match begun {
            Ok(tx) => return Ok(Some(tx)),
            Err(err) if is_busy(&err) => match mode {
                LockMode::SkipLocked => return Ok(None),
                LockMode::Wait => return Err(lock_timeout_error("begin_locked")),
                LockMode::Block => {
                    attempts += 1;
                    tracing::warn!(
                        attempts,
                        waited_ms = (wait * attempts).as_millis() as u64,
                        "Metadata store still locked, waiting"
                    );
                }
            },
            Err(err) => return Err(from_rusqlite(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_path_strips_scheme() {
        assert_eq!(database_path("sqlite:///tmp/x.db"), Path::new("/tmp/x.db"));
        assert_eq!(database_path("/tmp/x.db"), Path::new("/tmp/x.db"));
    }

    #[test]
    fn test_open_enables_wal() {
        let dir = TempDir::new().unwrap();
        let conn = open(dir.path().join("meta.db"), DEFAULT_LOCK_TIMEOUT).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_skip_locked_returns_none_when_busy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.db");
        let mut holder = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
        let mut other = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();

        let held = begin_locked(&mut holder, LockMode::Wait, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .unwrap();

        let skipped =
            begin_locked(&mut other, LockMode::SkipLocked, Duration::from_millis(50)).unwrap();
        assert!(skipped.is_none());
        drop(skipped);

        let waited = begin_locked(&mut other, LockMode::Wait, Duration::from_millis(50));
        assert!(waited.is_err());
        drop(waited);

        held.commit().unwrap();
        assert!(begin_locked(&mut other, LockMode::SkipLocked, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_block_outlasts_lock_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.db");
        let mut other = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();

        let holder = std::thread::spawn(move || {
            let mut conn = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
            let tx = begin_locked(&mut conn, LockMode::Wait, DEFAULT_LOCK_TIMEOUT)
                .unwrap()
                .unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(600));
            tx.commit().unwrap();
        });
        locked_rx.recv().unwrap();

        let short = Duration::from_millis(100);
        let tx = begin_locked(&mut other, LockMode::Block, short).unwrap();
        assert!(tx.is_some());
        drop(tx);
        holder.join().unwrap();
    }

    #[test]
    fn test_skip_locked_waits_out_a_short_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.db");
        let mut other = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();

        let holder = std::thread::spawn(move || {
            let mut conn = open(&path, DEFAULT_LOCK_TIMEOUT).unwrap();
            let tx = begin_locked(&mut conn, LockMode::Wait, DEFAULT_LOCK_TIMEOUT)
                .unwrap()
                .unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(150));
            tx.commit().unwrap();
        });
        locked_rx.recv().unwrap();

        let tx = begin_locked(&mut other, LockMode::SkipLocked, DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(tx.is_some());
        drop(tx);
        holder.join().unwrap();
    }
}
