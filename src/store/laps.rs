//! Idempotent lap persistence
//!
//! ## Lap identity
//!
//! A lap row is identified by `(combo_id, session_key, lap_number)`:
//!
//! - `session_key` fingerprints the uploaded session (driver, track, car and the
//!   ordered list of lap times), so the same session delivered twice lands on the
//!   same rows while two different sessions never share one.
//! - `lap_number` is the lap's position in the upload, so distinct laps of one
//!   session never collapse into a single row.
//!
//! Everything else (`user_id`, `lap_time`, `valid`, `sectors`) is overwritten by
//! the most recent delivery.

use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use tracing::trace;

use super::db_error;
use crate::session::{CanonicalLap, CanonicalSession};
use crate::{IngestError, Result};

const UPSERT_SQL: &str = "
INSERT INTO laps (user_id, combo_id, session_key, lap_number, lap_time, valid, sectors)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT (combo_id, session_key, lap_number) DO UPDATE SET
    user_id  = excluded.user_id,
    lap_time = excluded.lap_time,
    valid    = excluded.valid,
    sectors  = excluded.sectors
";

/// Fingerprint identifying one uploaded session.
pub fn session_key(session: &CanonicalSession) -> String {
    let mut hasher = Sha256::new();
    for part in [&session.username, &session.track, &session.car] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    for lap in &session.laps {
        hasher.update(lap.lap_number.to_le_bytes());
        hasher.update(lap.time.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Insert a lap, or overwrite the existing row with the same identity.
pub fn upsert(
    conn: &Connection,
    user_id: i64,
    combo_id: i64,
    session_key: &str,
    lap: &CanonicalLap,
) -> Result<()> {
    let sectors = serde_json::to_string(&lap.sectors)
        .map_err(|e| IngestError::payload_error("sector serialization", e.to_string()))?;

    conn.prepare_cached(UPSERT_SQL)
        .and_then(|mut stmt| {
            stmt.execute(params![
                user_id,
                combo_id,
                session_key,
                lap.lap_number,
                lap.time,
                lap.valid,
                sectors
            ])
        })
        .map_err(db_error("upsert lap"))?;

    trace!(user_id, combo_id, lap_number = lap.lap_number, time = lap.time, "Upserted lap");
    Ok(())
}
