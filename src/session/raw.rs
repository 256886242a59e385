//! Raw client payload structures
//!
//! These mirror what simulator exporters upload. Every field is optional and
//! tolerant: a field holding the wrong JSON type is read as absent instead of
//! failing the whole payload, so that validation can report it precisely.
//!
//! Lists are kept as raw JSON values and read one element at a time, so a single
//! malformed element never hides its siblings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One uploaded session as sent by the client
#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawSession {
    /// Track name
    #[serde(deserialize_with = "lenient")]
    pub track: Option<String>,
    /// Participants; only the first entry is the uploading driver
    #[serde(deserialize_with = "lenient")]
    pub players: Option<Vec<Value>>,
    /// Sub-sessions; only the first entry carries laps we ingest
    #[serde(deserialize_with = "lenient")]
    pub sessions: Option<Vec<Value>>,
}

/// Participant entry
#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawPlayer {
    /// Driver name
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    /// Car model
    #[serde(deserialize_with = "lenient")]
    pub car: Option<String>,
}

/// Sub-session entry
#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawSubSession {
    #[serde(deserialize_with = "lenient")]
    pub laps: Option<Vec<Value>>,
}

/// Lap entry
#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawLap {
    /// Lap duration; the lap is dropped without it
    #[serde(deserialize_with = "lenient")]
    pub time: Option<f64>,
    /// Validity flag, either 0/1 or a boolean
    #[serde(deserialize_with = "lenient")]
    pub valid: Option<RawValidity>,
    /// Ordered sector times, possibly with malformed entries
    #[serde(deserialize_with = "lenient")]
    pub sectors: Option<Vec<Value>>,
}

/// Validity flag as exporters send it
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawValidity {
    Flag(bool),
    Number(f64),
}

impl RawValidity {
    /// Collapse to the canonical 0/1 flag
    pub fn as_flag(self) -> u8 {
        match self {
            RawValidity::Flag(valid) => u8::from(valid),
            RawValidity::Number(n) => u8::from(n != 0.0),
        }
    }
}

impl RawSession {
    /// Read one session from an arbitrary JSON value.
    ///
    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        object(value)
    }

    /// First player, if it is an object
    pub fn first_player(&self) -> Option<RawPlayer> {
        self.players.as_ref().and_then(|players| players.first()).and_then(object)
    }

    /// First sub-session, if it is an object
    pub fn first_sub_session(&self) -> Option<RawSubSession> {
        self.sessions.as_ref().and_then(|sessions| sessions.first()).and_then(object)
    }

    /// Laps of the first sub-session in upload order.
    ///
    /// `None` marks an element that is not a lap object.
    pub fn first_laps(&self) -> Vec<Option<RawLap>> {
        self.first_sub_session()
            .and_then(|sub| sub.laps)
            .map(|laps| laps.iter().map(RawLap::from_value).collect())
            .unwrap_or_default()
    }
}

impl RawLap {
    /// Read one lap; `None` when the value is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        object(value)
    }

    /// Numeric sector times in order; malformed entries are left out.
    pub fn sector_times(&self) -> Vec<f64> {
        self.sectors
            .as_ref()
            .map(|sectors| sectors.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default()
    }
}

fn object<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    T::deserialize(value).ok()
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
