//! UDP telemetry receiver behind the service

use anyhow::{Context, Result};
use apex_laps::{LapService, ServiceConfig, TelemetryPacket};
use futures::StreamExt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::UdpSocket;

#[tokio::test]
async fn datagrams_are_decoded_and_counted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = LapService::start(ServiceConfig {
        database_path: dir.path().join("apex.db"),
        watch_config_path: dir.path().join("config.json"),
        telemetry_bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        telemetry_port: 0,
        ..ServiceConfig::default()
    })
    .await?;

    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let packet = TelemetryPacket { packet_id: 1, speed_kmh: 250.0, rpm: 9000.0, gear: 6 };
    sender.send_to(&packet.to_bytes(), service.telemetry_addr()).await?;
    sender.send_to(&[0u8; 5], service.telemetry_addr()).await?;

    let mut updates = service.telemetry_receiver().stats_updates();
    let stats = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(stats) = updates.next().await {
            if stats.received == 2 {
                return Some(stats);
            }
        }
        None
    })
    .await?
    .context("receiver stopped before both datagrams arrived")?;

    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.rejected, 1);

    drop(updates);
    service.shutdown().await;
    Ok(())
}
