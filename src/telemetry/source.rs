//! Packet source trait for raw telemetry feeds

use std::net::SocketAddr;

use crate::Result;

/// One raw datagram as received from a simulator or relay.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Raw bytes, undecoded
    pub payload: Vec<u8>,

    /// Sender address, when the transport knows it
    pub origin: Option<SocketAddr>,
}

impl Datagram {
    /// Create a datagram without origin information
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload, origin: None }
    }
}

/// Trait for raw telemetry sources
///
/// Sources abstract over where packets come from (a UDP socket, a captured
/// recording in tests) and handle their own blocking internally.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Get the next raw datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - Datagram available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Error occurred
    async fn next_datagram(&mut self) -> Result<Option<Datagram>>;

    /// Human-readable description used in log lines
    fn describe(&self) -> String;
}

/// Source that replays a fixed list of datagrams and then ends.
#[derive(Debug, Default)]
pub struct RecordedSource {
    datagrams: std::collections::VecDeque<Datagram>,
}

impl RecordedSource {
    /// Create a source from raw payloads, replayed in order
    pub fn new(payloads: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self { datagrams: payloads.into_iter().map(Datagram::new).collect() }
    }
}

#[async_trait::async_trait]
impl PacketSource for RecordedSource {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        Ok(self.datagrams.pop_front())
    }

    fn describe(&self) -> String {
        format!("recording ({} datagrams left)", self.datagrams.len())
    }
}
