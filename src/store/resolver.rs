//! Find-or-create resolution of reference entities
//!
//! Every resolution is a single `INSERT ... ON CONFLICT DO NOTHING RETURNING id`
//! followed, when the row already existed, by a lookup on the natural key. There
//! is no window between a lookup and an insert for a concurrent creator to slip
//! into.
//!
//! If an insert still reports a uniqueness violation, another connection created
//! the row first; the lookup is re-run exactly once and its id returned.

use rusqlite::{Connection, OptionalExtension, Params, ffi};
use tracing::{debug, trace};

use super::db_error;
use crate::{IngestError, Result};

/// Reference entities keyed by a single name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Track,
    Car,
}

impl EntityKind {
    /// Short label for logs and error context
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Track => "track",
            EntityKind::Car => "car",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            EntityKind::User => {
                "INSERT INTO users (username) VALUES (?1) ON CONFLICT (username) DO NOTHING RETURNING id"
            }
            EntityKind::Track => {
                "INSERT INTO tracks (name) VALUES (?1) ON CONFLICT (name) DO NOTHING RETURNING id"
            }
            EntityKind::Car => {
                "INSERT INTO cars (name) VALUES (?1) ON CONFLICT (name) DO NOTHING RETURNING id"
            }
        }
    }

    fn lookup_sql(self) -> &'static str {
        match self {
            EntityKind::User => "SELECT id FROM users WHERE username = ?1",
            EntityKind::Track => "SELECT id FROM tracks WHERE name = ?1",
            EntityKind::Car => "SELECT id FROM cars WHERE name = ?1",
        }
    }
}

/// Resolve a user, track or car name to its id, creating the row if needed.
pub fn resolve(conn: &Connection, kind: EntityKind, natural_key: &str) -> Result<i64> {
    let id = find_or_create(
        conn,
        kind.label(),
        kind.insert_sql(),
        kind.lookup_sql(),
        [natural_key],
    )?;
    trace!(kind = kind.label(), key = natural_key, id, "Resolved entity");
    Ok(id)
}

/// Resolve a car/track pairing to its combo id, creating the row if needed.
pub fn resolve_combo(conn: &Connection, car_id: i64, track_id: i64) -> Result<i64> {
    let id = find_or_create(
        conn,
        "combo",
        "INSERT INTO combos (car_id, track_id) VALUES (?1, ?2)
         ON CONFLICT (car_id, track_id) DO NOTHING RETURNING id",
        "SELECT id FROM combos WHERE car_id = ?1 AND track_id = ?2",
        [car_id, track_id],
    )?;
    trace!(car_id, track_id, id, "Resolved combo");
    Ok(id)
}

fn find_or_create<P>(
    conn: &Connection,
    label: &str,
    insert_sql: &str,
    lookup_sql: &str,
    params: P,
) -> Result<i64>
where
    P: Params + Clone,
{
    let inserted = conn
        .query_row(insert_sql, params.clone(), |row| row.get::<_, i64>(0))
        .optional();

    match inserted {
        Ok(Some(id)) => {
            debug!(entity = label, id, "Created entity");
            Ok(id)
        }
        Ok(None) => lookup(conn, label, lookup_sql, params)?.ok_or_else(|| {
            IngestError::database(
                format!("resolve {label}"),
                rusqlite::Error::QueryReturnedNoRows,
            )
        }),
        Err(e) if is_unique_violation(&e) => {
            debug!(entity = label, "Concurrent insert detected, re-reading");
            match lookup(conn, label, lookup_sql, params)? {
                Some(id) => Ok(id),
                None => Err(IngestError::database(format!("resolve {label}"), e)),
            }
        }
        Err(e) => Err(IngestError::database(format!("create {label}"), e)),
    }
}

fn lookup<P: Params>(conn: &Connection, label: &str, sql: &str, params: P) -> Result<Option<i64>> {
    conn.query_row(sql, params, |row| row.get(0))
        .optional()
        .map_err(db_error(&format!("look up {label}")))
}

/// Whether `err` is a UNIQUE or PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error().map(|e| e.extended_code),
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use std::sync::{Arc, Barrier};

    fn scratch() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        (dir, database)
    }

    #[test]
    fn resolve_is_stable_per_name() {
        let (_dir, database) = scratch();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        let alice = resolve(conn, EntityKind::User, "alice").unwrap();
        let bob = resolve(conn, EntityKind::User, "bob").unwrap();
        assert_ne!(alice, bob);
        assert_eq!(resolve(conn, EntityKind::User, "alice").unwrap(), alice);

        // Same name in different tables are different entities
        resolve(conn, EntityKind::Track, "alice").unwrap();
        let counts = handle.row_counts().unwrap();
        assert_eq!(counts.users, 2);
        assert_eq!(counts.tracks, 1);
    }

    #[test]
    fn combo_resolves_once_per_pair() {
        let (_dir, database) = scratch();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        let car = resolve(conn, EntityKind::Car, "GT3").unwrap();
        let monza = resolve(conn, EntityKind::Track, "Monza").unwrap();
        let spa = resolve(conn, EntityKind::Track, "Spa").unwrap();

        let first = resolve_combo(conn, car, monza).unwrap();
        assert_eq!(resolve_combo(conn, car, monza).unwrap(), first);
        assert_ne!(resolve_combo(conn, car, spa).unwrap(), first);
        assert_eq!(handle.row_counts().unwrap().combos, 2);
    }

    #[test]
    fn concurrent_resolution_creates_one_row() {
        let (_dir, database) = scratch();
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let ids: Vec<(i64, i64)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let database = database.clone();
                    let barrier = Arc::clone(&barrier);
                    scope.spawn(move || {
                        let handle = database.connect().unwrap();
                        let conn = handle.connection();
                        barrier.wait();
                        let car = resolve(conn, EntityKind::Car, "GT3").unwrap();
                        let track = resolve(conn, EntityKind::Track, "Monza").unwrap();
                        (car, resolve_combo(conn, car, track).unwrap())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        let counts = database.connect().unwrap().row_counts().unwrap();
        assert_eq!(counts.cars, 1);
        assert_eq!(counts.tracks, 1);
        assert_eq!(counts.combos, 1);
    }

    // Plain insert without ON CONFLICT, as a racing creator would surface it
    const RACING_INSERT: &str = "INSERT INTO users (username) VALUES (?1) RETURNING id";

    #[test]
    fn unique_violation_falls_back_to_existing_row() {
        let (_dir, database) = scratch();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        let alice = resolve(conn, EntityKind::User, "alice").unwrap();
        let id = find_or_create(
            conn,
            "user",
            RACING_INSERT,
            EntityKind::User.lookup_sql(),
            ["alice"],
        )
        .unwrap();

        assert_eq!(id, alice);
        assert_eq!(handle.row_counts().unwrap().users, 1);
    }

    #[test]
    fn unique_violation_without_a_row_is_a_database_error() {
        let (_dir, database) = scratch();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        resolve(conn, EntityKind::User, "alice").unwrap();
        let err = find_or_create(
            conn,
            "user",
            RACING_INSERT,
            "SELECT id FROM users WHERE username = ?1 AND id < 0",
            ["alice"],
        )
        .unwrap_err();

        assert!(matches!(err, IngestError::Database { .. }));
    }

    #[test]
    fn detects_unique_violations() {
        let (_dir, database) = scratch();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        conn.execute("INSERT INTO users (username) VALUES ('alice')", []).unwrap();
        let err = conn.execute("INSERT INTO users (username) VALUES ('alice')", []).unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }
}
