//! Fixed-layout telemetry packet decoding
//!
//! ## Packet Layout
//!
//! Every packet is 16 bytes, little-endian:
//!
//! ```text
//! offset  size  type  field
//!  0      4     i32   packet_id
//!  4      4     f32   speed_kmh
//!  8      4     f32   rpm
//! 12      4     i32   gear
//! ```
//!
//! Trailing bytes after the first 16 are ignored. Decoding never produces a
//! partially populated packet: anything shorter than [`PACKET_SIZE`] is rejected.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{IngestError, Result};

/// Size in bytes of an encoded [`TelemetryPacket`].
pub const PACKET_SIZE: usize = 16;

const PACKET_ID_OFFSET: usize = 0;
const SPEED_OFFSET: usize = 4;
const RPM_OFFSET: usize = 8;
const GEAR_OFFSET: usize = 12;

/// One decoded live telemetry sample.
///
/// Values are reported exactly as encoded; a negative speed or an absurd gear is
/// passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPacket {
    pub packet_id: i32,
    pub speed_kmh: f32,
    pub rpm: f32,
    pub gear: i32,
}

impl TelemetryPacket {
    /// Decode a packet from the start of `buffer`.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        let Some(bytes) = buffer.first_chunk::<PACKET_SIZE>() else {
            return Err(IngestError::decode_error(PACKET_SIZE, buffer.len()));
        };

        let packet = Self {
            packet_id: i32::from_le_bytes(word(bytes, PACKET_ID_OFFSET)),
            speed_kmh: f32::from_le_bytes(word(bytes, SPEED_OFFSET)),
            rpm: f32::from_le_bytes(word(bytes, RPM_OFFSET)),
            gear: i32::from_le_bytes(word(bytes, GEAR_OFFSET)),
        };

        trace!(
            packet_id = packet.packet_id,
            speed_kmh = packet.speed_kmh,
            rpm = packet.rpm,
            gear = packet.gear,
            trailing = buffer.len() - PACKET_SIZE,
            "Decoded telemetry packet"
        );

        Ok(packet)
    }

    /// Decode a packet sent as a hex string, as relays forward them.
    pub fn decode_hex(payload: &str) -> Result<Self> {
        let bytes = hex::decode(payload.trim())?;
        Self::decode(&bytes)
    }

    /// Encode the packet back into its 16-byte wire form.
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        out[PACKET_ID_OFFSET..SPEED_OFFSET].copy_from_slice(&self.packet_id.to_le_bytes());
        out[SPEED_OFFSET..RPM_OFFSET].copy_from_slice(&self.speed_kmh.to_le_bytes());
        out[RPM_OFFSET..GEAR_OFFSET].copy_from_slice(&self.rpm.to_le_bytes());
        out[GEAR_OFFSET..PACKET_SIZE].copy_from_slice(&self.gear.to_le_bytes());
        out
    }
}

fn word(bytes: &[u8; PACKET_SIZE], offset: usize) -> [u8; 4] {
    [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]
}
