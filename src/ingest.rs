//! Ingestion orchestration
//!
//! One call normalizes the payload once, then walks the canonical sessions in
//! order. For each session it resolves the driver, track, car and combo and then
//! upserts every lap, all inside one transaction. A store failure rolls back the
//! session in progress and aborts the rest of the request; sessions committed
//! before it stay committed.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::session::{CanonicalSession, SkippedSession, normalize};
use crate::store::{EntityKind, StoreHandle, resolve, resolve_combo, session_key, upsert};
use crate::Result;

/// Outcome of one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Sessions committed to the store
    pub uploaded_sessions: usize,
    /// Laps committed to the store
    pub uploaded_laps: usize,
    /// Sessions skipped by validation
    pub skipped_sessions: Vec<SkippedSession>,
    /// Laps dropped for lacking a time or not being objects
    pub dropped_laps: usize,
}

/// Ingest a raw payload through an open store handle.
#[instrument(level = "debug", skip_all)]
pub fn ingest(store: &mut StoreHandle, payload: &Value) -> Result<IngestReport> {
    let normalized = normalize(payload);

    let mut report = IngestReport {
        skipped_sessions: normalized.skipped,
        dropped_laps: normalized.dropped_laps,
        ..IngestReport::default()
    };

    for session in &normalized.sessions {
        let laps = store_session(store, session)?;
        report.uploaded_sessions += 1;
        report.uploaded_laps += laps;

        info!(
            laps,
            car = %session.car,
            track = %session.track,
            username = %session.username,
            "Uploaded session"
        );
    }

    Ok(report)
}

fn store_session(store: &mut StoreHandle, session: &CanonicalSession) -> Result<usize> {
    let tx = store.transaction()?;

    let user_id = resolve(&tx, EntityKind::User, &session.username)?;
    let track_id = resolve(&tx, EntityKind::Track, &session.track)?;
    let car_id = resolve(&tx, EntityKind::Car, &session.car)?;
    let combo_id = resolve_combo(&tx, car_id, track_id)?;

    let key = session_key(session);
    for lap in &session.laps {
        upsert(&tx, user_id, combo_id, &key, lap)?;
    }

    tx.commit().map_err(crate::store::db_error("commit session"))?;
    Ok(session.laps.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Database, RowCounts};
    use serde_json::json;

    fn scratch() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("laps.db")).unwrap();
        (dir, database)
    }

    fn monza_payload() -> Value {
        json!([{
            "track": "Monza",
            "players": [{ "name": "alice", "car": "GT3" }],
            "sessions": [{ "laps": [{ "time": 95000, "valid": 1, "sectors": [30000, 32000, 33000] }] }]
        }])
    }

    #[test]
    fn monza_end_to_end_is_idempotent() {
        let (_dir, database) = scratch();
        let mut store = database.connect().unwrap();

        let first = ingest(&mut store, &monza_payload()).unwrap();
        assert_eq!(first.uploaded_sessions, 1);
        assert_eq!(first.uploaded_laps, 1);

        let expected = RowCounts { users: 1, tracks: 1, cars: 1, combos: 1, laps: 1 };
        assert_eq!(store.row_counts().unwrap(), expected);
        let rows_before = store.lap_rows().unwrap();
        assert_eq!(rows_before[0].lap_time, 95000.0);

        ingest(&mut store, &monza_payload()).unwrap();
        assert_eq!(store.row_counts().unwrap(), expected);
        assert_eq!(store.lap_rows().unwrap(), rows_before);
    }

    #[test]
    fn skipped_sessions_are_reported_not_failed() {
        let (_dir, database) = scratch();
        let mut store = database.connect().unwrap();

        let payload = json!([
            { "track": "Spa", "players": [{ "car": "GT4" }] },
            monza_payload()[0].clone()
        ]);
        let report = ingest(&mut store, &payload).unwrap();

        assert_eq!(report.uploaded_sessions, 1);
        assert_eq!(report.skipped_sessions.len(), 1);
        assert_eq!(report.skipped_sessions[0].index, 0);
        assert_eq!(store.row_counts().unwrap().tracks, 1);
    }

    #[test]
    fn store_failure_keeps_earlier_sessions_and_rolls_back_the_current_one() {
        let (_dir, database) = scratch();
        let mut store = database.connect().unwrap();

        // Reject one driver at the store level to simulate a mid-request failure
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_mallory BEFORE INSERT ON laps
                 WHEN (SELECT username FROM users WHERE id = NEW.user_id) = 'mallory'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let payload = json!([
            monza_payload()[0].clone(),
            {
                "track": "Imola",
                "players": [{ "name": "mallory", "car": "M4" }],
                "sessions": [{ "laps": [{ "time": 101.0 }] }]
            },
            {
                "track": "Suzuka",
                "players": [{ "name": "carol", "car": "GT3" }],
                "sessions": [{ "laps": [{ "time": 120.0 }] }]
            }
        ]);

        let err = ingest(&mut store, &payload).unwrap_err();
        assert!(matches!(err, crate::IngestError::Database { .. }));

        let counts = store.row_counts().unwrap();
        // Monza committed; Imola rolled back entirely; Suzuka never attempted
        assert_eq!(counts, RowCounts { users: 1, tracks: 1, cars: 1, combos: 1, laps: 1 });
    }

    #[test]
    fn resubmission_with_new_validity_updates_in_place() {
        let (_dir, database) = scratch();
        let mut store = database.connect().unwrap();

        ingest(&mut store, &monza_payload()).unwrap();

        let mut changed = monza_payload();
        changed[0]["sessions"][0]["laps"][0]["valid"] = json!(0);
        ingest(&mut store, &changed).unwrap();

        let rows = store.lap_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].valid, 0);
    }
}
