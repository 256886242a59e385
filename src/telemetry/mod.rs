//! # Live Telemetry
//!
//! Decoding and acknowledgment of the fixed-layout binary telemetry packets that
//! simulators broadcast over UDP (or that relays forward as hex strings).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────────────┐    ┌──────────────────┐
//! │ PacketSource │──► │ TelemetryReceiver │──► │ TelemetryPacket  │
//! │ (UDP, tests) │    │  (spawned task)   │    │   ::decode()     │
//! └──────────────┘    └─────────┬─────────┘    └──────────────────┘
//!                               ▼
//!                        ReceiverStats (watch)
//! ```
//!
//! Decoded packets are logged and counted only. Persisting or rebroadcasting the
//! raw stream is outside this crate.

pub mod packet;
pub mod receiver;
pub mod source;
pub mod udp;

pub use packet::{PACKET_SIZE, TelemetryPacket};
pub use receiver::{ReceiverHandle, ReceiverStats, TelemetryReceiver};
pub use source::{Datagram, PacketSource, RecordedSource};
pub use udp::UdpPacketSource;
