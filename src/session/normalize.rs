//! Raw payload validation and normalization

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::raw::{RawLap, RawSession};
use super::{CanonicalLap, CanonicalSession};
use crate::{IngestError, Result};

/// Why a raw session was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The payload element was not a JSON object
    NotAnObject,
    /// No usable `track`
    MissingTrack,
    /// No usable `car` on the first player
    MissingCar,
    /// No usable `name` on the first player
    MissingUsername,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotAnObject => "not an object",
            SkipReason::MissingTrack => "missing track",
            SkipReason::MissingCar => "missing car",
            SkipReason::MissingUsername => "missing username",
        };
        f.write_str(text)
    }
}

/// A raw session that failed validation, with every reason found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSession {
    /// Position of the session in the uploaded payload
    pub index: usize,
    pub reasons: Vec<SkipReason>,
}

/// Output of [`normalize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Sessions that passed validation, in payload order
    pub sessions: Vec<CanonicalSession>,
    /// Sessions that were skipped
    pub skipped: Vec<SkippedSession>,
    /// Laps dropped for lacking a time or not being objects, across accepted sessions
    pub dropped_laps: usize,
}

impl Normalized {
    /// Total number of canonical laps
    pub fn lap_count(&self) -> usize {
        self.sessions.iter().map(|s| s.laps.len()).sum()
    }
}

/// Normalize an uploaded payload (one session object or a list of them).
///
/// Never fails: invalid sessions and laps are skipped and reported.
pub fn normalize(raw: &Value) -> Normalized {
    let elements: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut normalized = Normalized::default();

    for (index, element) in elements.into_iter().enumerate() {
        let Some(raw_session) = RawSession::from_value(element) else {
            warn!(index, "Skipping session: payload element is not an object");
            normalized.skipped.push(SkippedSession { index, reasons: vec![SkipReason::NotAnObject] });
            continue;
        };

        match validate(&raw_session) {
            Ok((track, car, username)) => {
                let (laps, dropped) = normalize_laps(&raw_session.first_laps());
                if dropped > 0 {
                    debug!(index, dropped, "Dropped malformed laps or laps without a time");
                }
                normalized.dropped_laps += dropped;
                normalized.sessions.push(CanonicalSession { track, car, username, laps });
            }
            Err(reasons) => {
                warn!(
                    index,
                    track = ?raw_session.track,
                    reasons = ?reasons,
                    "Skipping incomplete session"
                );
                normalized.skipped.push(SkippedSession { index, reasons });
            }
        }
    }

    normalized
}

/// Parse JSON text and normalize it.
pub fn normalize_str(text: &str) -> Result<Normalized> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| IngestError::payload_error("session payload", e.to_string()))?;
    Ok(normalize(&value))
}

fn validate(raw: &RawSession) -> std::result::Result<(String, String, String), Vec<SkipReason>> {
    let player = raw.first_player().unwrap_or_default();
    let track = non_empty(raw.track.as_deref());
    let car = non_empty(player.car.as_deref());
    let username = non_empty(player.name.as_deref());

    match (track, car, username) {
        (Some(track), Some(car), Some(username)) => {
            Ok((track.to_string(), car.to_string(), username.to_string()))
        }
        (track, car, username) => {
            let mut reasons = Vec::new();
            if track.is_none() {
                reasons.push(SkipReason::MissingTrack);
            }
            if car.is_none() {
                reasons.push(SkipReason::MissingCar);
            }
            if username.is_none() {
                reasons.push(SkipReason::MissingUsername);
            }
            Err(reasons)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_laps(raw_laps: &[Option<RawLap>]) -> (Vec<CanonicalLap>, usize) {
    let mut laps = Vec::with_capacity(raw_laps.len());
    let mut dropped = 0;

    for (position, lap) in raw_laps.iter().enumerate() {
        let (lap, time) = match lap {
            Some(lap @ RawLap { time: Some(time), .. }) => (lap, *time),
            _ => {
                dropped += 1;
                continue;
            }
        };

        laps.push(CanonicalLap {
            lap_number: position as u32,
            time,
            valid: lap.valid.map(|v| v.as_flag()).unwrap_or(1),
            sectors: lap.sector_times(),
        });
    }

    (laps, dropped)
}
