//! Read-side lap queries

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use super::db_error;
use crate::Result;

/// Fastest recorded lap for one driver, track and car
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestLap {
    pub username: String,
    pub track: String,
    pub car: String,
    pub best_time: f64,
}

/// The single fastest lap in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastestLap {
    pub lap_time: f64,
    pub car: String,
    pub track: String,
    pub username: String,
}

/// Aggregate counts over recorded laps
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapSummary {
    pub total_laps: u64,
    pub distinct_tracks: u64,
    pub distinct_cars: u64,
    pub fastest_lap: Option<FastestLap>,
}

/// Number of rows in each table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub users: u64,
    pub tracks: u64,
    pub cars: u64,
    pub combos: u64,
    pub laps: u64,
}

/// One stored lap with its references resolved to names
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapRow {
    pub id: i64,
    pub username: String,
    pub track: String,
    pub car: String,
    pub lap_number: u32,
    pub lap_time: f64,
    pub valid: u8,
    pub sectors: Vec<f64>,
}

const LAP_JOINS: &str = "
FROM laps l
JOIN users u  ON u.id = l.user_id
JOIN combos c ON c.id = l.combo_id
JOIN tracks t ON t.id = c.track_id
JOIN cars r   ON r.id = c.car_id
";

pub fn best_laps(conn: &Connection) -> Result<Vec<BestLap>> {
    let sql = format!(
        "SELECT u.username, t.name, r.name, MIN(l.lap_time) AS best_time {LAP_JOINS}
         GROUP BY u.id, t.id, r.id
         ORDER BY t.name, r.name, best_time"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_error("prepare best laps"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BestLap {
                username: row.get(0)?,
                track: row.get(1)?,
                car: row.get(2)?,
                best_time: row.get(3)?,
            })
        })
        .map_err(db_error("query best laps"))?;

    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_error("read best laps"))
}

pub fn lap_summary(conn: &Connection) -> Result<LapSummary> {
    let (total_laps, distinct_tracks, distinct_cars) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(DISTINCT c.track_id), COUNT(DISTINCT c.car_id)
             FROM laps l JOIN combos c ON c.id = l.combo_id",
            [],
            |row| Ok((count(row, 0)?, count(row, 1)?, count(row, 2)?)),
        )
        .map_err(db_error("count laps"))?;

    let fastest_lap = conn
        .query_row(
            &format!(
                "SELECT l.lap_time, r.name, t.name, u.username {LAP_JOINS}
                 ORDER BY l.lap_time ASC, l.id ASC LIMIT 1"
            ),
            [],
            |row| {
                Ok(FastestLap {
                    lap_time: row.get(0)?,
                    car: row.get(1)?,
                    track: row.get(2)?,
                    username: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(db_error("query fastest lap"))?;

    Ok(LapSummary { total_laps, distinct_tracks, distinct_cars, fastest_lap })
}

pub fn row_counts(conn: &Connection) -> Result<RowCounts> {
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM tracks),
                (SELECT COUNT(*) FROM cars), (SELECT COUNT(*) FROM combos),
                (SELECT COUNT(*) FROM laps)",
        [],
        |row| {
            Ok(RowCounts {
                users: count(row, 0)?,
                tracks: count(row, 1)?,
                cars: count(row, 2)?,
                combos: count(row, 3)?,
                laps: count(row, 4)?,
            })
        },
    )
    .map_err(db_error("count rows"))
}

/// Read a `COUNT(*)` column; SQLite only hands back signed integers.
fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let n: i64 = row.get(idx)?;
    u64::try_from(n)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub fn lap_rows(conn: &Connection) -> Result<Vec<LapRow>> {
    let sql = format!(
        "SELECT l.id, u.username, t.name, r.name, l.lap_number, l.lap_time, l.valid, l.sectors
         {LAP_JOINS} ORDER BY l.id"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_error("prepare lap rows"))?;
    let rows = stmt
        .query_map([], |row| {
            let sectors: String = row.get(7)?;
            let sectors = serde_json::from_str(&sectors).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
            })?;
            Ok(LapRow {
                id: row.get(0)?,
                username: row.get(1)?,
                track: row.get(2)?,
                car: row.get(3)?,
                lap_number: row.get(4)?,
                lap_time: row.get(5)?,
                valid: row.get(6)?,
                sectors,
            })
        })
        .map_err(db_error("query lap rows"))?;

    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_error("read lap rows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CanonicalLap;
    use crate::store::{Database, EntityKind, resolve, resolve_combo, upsert};

    fn record(conn: &Connection, user: &str, track: &str, car: &str, key: &str, times: &[f64]) {
        let user = resolve(conn, EntityKind::User, user).unwrap();
        let car = resolve(conn, EntityKind::Car, car).unwrap();
        let track = resolve(conn, EntityKind::Track, track).unwrap();
        let combo = resolve_combo(conn, car, track).unwrap();
        for (n, time) in times.iter().enumerate() {
            let lap = CanonicalLap { lap_number: n as u32, time: *time, valid: 1, sectors: vec![] };
            upsert(conn, user, combo, key, &lap).unwrap();
        }
    }

    #[test]
    fn empty_store_has_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        let handle = database.connect().unwrap();

        assert_eq!(handle.lap_summary().unwrap(), LapSummary::default());
        assert!(handle.best_laps().unwrap().is_empty());
    }

    #[test]
    fn best_laps_take_the_minimum_per_driver_track_car() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        record(conn, "alice", "Monza", "GT3", "s1", &[96.0, 95.0, 97.5]);
        record(conn, "alice", "Monza", "GT3", "s2", &[94.5]);
        record(conn, "bob", "Monza", "GT3", "s3", &[99.0]);
        record(conn, "alice", "Spa", "GT3", "s4", &[140.0]);

        let best = handle.best_laps().unwrap();
        assert_eq!(best.len(), 3);
        assert_eq!(
            best[0],
            BestLap {
                username: "alice".into(),
                track: "Monza".into(),
                car: "GT3".into(),
                best_time: 94.5
            }
        );
        assert_eq!(best[1].username, "bob");
        assert_eq!(best[2].track, "Spa");
    }

    #[test]
    fn summary_counts_and_fastest_lap() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        let handle = database.connect().unwrap();
        let conn = handle.connection();

        record(conn, "alice", "Monza", "GT3", "s1", &[96.0, 95.0]);
        record(conn, "bob", "Spa", "F1", "s2", &[105.0]);
        record(conn, "bob", "Monza", "F1", "s3", &[82.25]);

        let summary = handle.lap_summary().unwrap();
        assert_eq!(summary.total_laps, 4);
        assert_eq!(summary.distinct_tracks, 2);
        assert_eq!(summary.distinct_cars, 2);
        assert_eq!(
            summary.fastest_lap,
            Some(FastestLap {
                lap_time: 82.25,
                car: "F1".into(),
                track: "Monza".into(),
                username: "bob".into()
            })
        );
    }
}
