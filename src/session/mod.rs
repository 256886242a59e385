//! # Session Normalization
//!
//! Simulator exporters upload lap data in a loosely structured JSON shape. This
//! module turns that shape into [`CanonicalSession`]s that the rest of the crate
//! can rely on.
//!
//! ## Pipeline
//!
//! ```text
//! JSON payload ──► RawSession (lenient serde) ──► validate ──► CanonicalSession
//!                                                    │
//!                                                    └──► SkippedSession (reasons)
//! ```
//!
//! ## Rules
//!
//! - A payload is either one session object or a list of them.
//! - Only the first player and the first sub-session of each session are used.
//! - A session without a track, car or username is skipped, never an error.
//! - A lap without a time, or a lap entry that is not an object, is dropped and
//!   counted; the rest of its session survives.
//! - Sector entries that are not numbers are left out.
//! - Missing `valid` means valid (`1`), missing `sectors` means no sectors.

use serde::{Deserialize, Serialize};

pub mod normalize;
pub mod raw;

pub use normalize::{Normalized, SkipReason, SkippedSession, normalize, normalize_str};
pub use raw::{RawLap, RawPlayer, RawSession, RawSubSession, RawValidity};

/// A validated session, ready for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSession {
    pub track: String,
    pub car: String,
    pub username: String,
    pub laps: Vec<CanonicalLap>,
}

/// A validated lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLap {
    /// Position of the lap in the uploaded lap list (zero based)
    pub lap_number: u32,
    /// Lap duration, in whatever unit the exporter uses
    pub time: f64,
    /// 1 when the lap counts, 0 otherwise
    pub valid: u8,
    /// Ordered sector times
    pub sectors: Vec<f64>,
}
