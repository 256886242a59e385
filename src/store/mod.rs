//! # Lap Store
//!
//! SQLite persistence for reference entities (users, tracks, cars, car/track
//! combos) and lap rows.
//!
//! ## Ownership
//!
//! - [`resolver`] is the only writer of `users`, `tracks`, `cars` and `combos`.
//! - [`laps`] is the only writer of `laps`.
//! - Nothing is ever deleted; only lap rows are updated in place.
//!
//! ## Handles
//!
//! [`Database`] is a cheap, cloneable description of the store. Every request
//! calls [`Database::connect`] and owns the returned [`StoreHandle`] until it is
//! dropped, which closes the connection on every exit path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::{IngestError, Result};

pub mod laps;
pub mod queries;
pub mod resolver;

pub use laps::{session_key, upsert};
pub use queries::{BestLap, FastestLap, LapRow, LapSummary, RowCounts};
pub use resolver::{EntityKind, resolve, resolve_combo};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tracks (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS cars (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS combos (
    id       INTEGER PRIMARY KEY,
    car_id   INTEGER NOT NULL REFERENCES cars(id),
    track_id INTEGER NOT NULL REFERENCES tracks(id),
    UNIQUE (car_id, track_id)
);

CREATE TABLE IF NOT EXISTS laps (
    id          INTEGER PRIMARY KEY,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    combo_id    INTEGER NOT NULL REFERENCES combos(id),
    session_key TEXT NOT NULL,
    lap_number  INTEGER NOT NULL,
    lap_time    REAL NOT NULL,
    valid       INTEGER NOT NULL CHECK (valid IN (0, 1)),
    sectors     TEXT NOT NULL DEFAULT '[]',
    UNIQUE (combo_id, session_key, lap_number)
);

CREATE INDEX IF NOT EXISTS idx_laps_user ON laps(user_id);
";

/// Location of the lap store
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the store at `path` and bootstrap its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::file_error(parent, e))?;
        }

        let database = Self { path };
        let handle = database.connect()?;
        handle.conn.execute_batch(SCHEMA_SQL).map_err(db_error("bootstrap schema"))?;

        info!(path = %database.path.display(), "Lap store ready");
        Ok(database)
    }

    /// Open a connection scoped to one request.
    pub fn connect(&self) -> Result<StoreHandle> {
        let conn = Connection::open(&self.path).map_err(db_error("open connection"))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_error("configure busy timeout"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error("enable foreign keys"))?;
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(db_error("enable WAL"))?;

        debug!(path = %self.path.display(), journal_mode = %mode, "Opened store connection");
        Ok(StoreHandle { conn })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One open connection to the lap store
pub struct StoreHandle {
    conn: Connection,
}

impl StoreHandle {
    /// Underlying connection, for reads and autocommit writes
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction.
    ///
    /// Transactions take the write lock up front so that concurrent requests queue
    /// on the busy timeout instead of failing on a read-to-write upgrade.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error("begin transaction"))
    }

    /// Best lap per (user, track, car)
    pub fn best_laps(&self) -> Result<Vec<BestLap>> {
        queries::best_laps(&self.conn)
    }

    /// Aggregate lap counts and the overall fastest lap
    pub fn lap_summary(&self) -> Result<LapSummary> {
        queries::lap_summary(&self.conn)
    }

    /// Row counts for every table
    pub fn row_counts(&self) -> Result<RowCounts> {
        queries::row_counts(&self.conn)
    }

    /// Every stored lap, ordered by id
    pub fn lap_rows(&self) -> Result<Vec<LapRow>> {
        queries::lap_rows(&self.conn)
    }
}

/// Map a rusqlite error into [`IngestError::Database`] for `operation`.
pub(crate) fn db_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> IngestError + '_ {
    move |source| IngestError::database(operation, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_bootstraps_schema_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("laps.db");

        let database = Database::open(&path).unwrap();
        Database::open(&path).unwrap();

        let handle = database.connect().unwrap();
        assert_eq!(handle.row_counts().unwrap(), RowCounts::default());
        assert!(path.exists());
    }

    #[test]
    fn transactions_roll_back_when_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        let mut handle = database.connect().unwrap();

        {
            let tx = handle.transaction().unwrap();
            resolve(&tx, EntityKind::User, "alice").unwrap();
        }

        assert_eq!(handle.row_counts().unwrap().users, 0);
    }
}
