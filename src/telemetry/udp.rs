//! UDP telemetry source

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::source::{Datagram, PacketSource};
use crate::{IngestError, Result};

/// Largest datagram we accept; simulator broadcasts are far below this.
const MAX_DATAGRAM_SIZE: usize = 2048;

/// Passive receiver bound to a local UDP port
pub struct UdpPacketSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    buffer: Vec<u8>,
}

impl UdpPacketSource {
    /// Bind a receiver to the given address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| IngestError::socket_error(addr, e))?;
        let local_addr = socket.local_addr().map_err(|e| IngestError::socket_error(addr, e))?;

        info!(address = %local_addr, "Listening for raw telemetry");

        Ok(Self { socket, local_addr, buffer: vec![0u8; MAX_DATAGRAM_SIZE] })
    }

    /// Address the socket is actually bound to (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl PacketSource for UdpPacketSource {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        let (len, origin) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|e| IngestError::socket_error(self.local_addr, e))?;

        debug!(bytes = len, origin = %origin, "Received telemetry datagram");

        Ok(Some(Datagram { payload: self.buffer[..len].to_vec(), origin: Some(origin) }))
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.local_addr)
    }
}
