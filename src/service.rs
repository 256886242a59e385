//! Request-level facade over the lap store, watcher and telemetry receiver
//!
//! [`LapService`] is what an outer transport (HTTP handlers, a CLI) talks to.
//! Each storage operation opens its own store connection on tokio's blocking
//! pool and drops it before returning.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::ingest::{IngestReport, ingest};
use crate::store::{BestLap, Database, LapSummary, StoreHandle};
use crate::telemetry::{ReceiverHandle, ReceiverStats, TelemetryPacket, TelemetryReceiver, UdpPacketSource};
use crate::watch::{FileHandler, WatchService};
use crate::{IngestError, Result};

/// Running ingestion service
pub struct LapService {
    database: Database,
    watch: Mutex<WatchService>,
    receiver: ReceiverHandle,
    telemetry_addr: SocketAddr,
}

impl LapService {
    /// Open the store, resume the persisted watch path and bind the UDP receiver.
    pub async fn start(config: ServiceConfig) -> Result<Self> {
        let database_path = config.database_path.clone();
        let database = tokio::task::spawn_blocking(move || Database::open(database_path)).await??;

        let handler = Arc::new(FileIngester { database: database.clone() });
        let mut watch = WatchService::new(config.watch_config_path.clone(), handler);
        watch.restore();

        let source = UdpPacketSource::bind(config.telemetry_addr()).await?;
        let telemetry_addr = source.local_addr();
        let receiver = TelemetryReceiver::spawn(source);

        info!(
            database = %database.path().display(),
            telemetry = %telemetry_addr,
            watching = ?watch.watch_path(),
            "Lap service started"
        );

        Ok(Self { database, watch: Mutex::new(watch), receiver, telemetry_addr })
    }

    /// Ingest one raw session payload.
    pub async fn ingest(&self, payload: Value) -> Result<IngestReport> {
        ingest_payload(self.database.clone(), payload).await
    }

    /// Read, parse and ingest a session file.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        ingest_file(self.database.clone(), path).await
    }

    /// Fastest lap per driver, track and car.
    pub async fn best_laps(&self) -> Result<Vec<BestLap>> {
        self.read(|store| store.best_laps()).await
    }

    /// Totals over every recorded lap.
    pub async fn lap_summary(&self) -> Result<LapSummary> {
        self.read(|store| store.lap_summary()).await
    }

    /// Watch a new directory for session files and persist the choice.
    pub async fn set_watch_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.watch.lock().await.set_watch_path(path).await
    }

    pub async fn watch_path(&self) -> Option<PathBuf> {
        self.watch.lock().await.watch_path().map(Path::to_path_buf)
    }

    pub async fn stop_watching(&self) {
        self.watch.lock().await.stop();
    }

    /// Decode a hex-encoded packet forwarded by a relay.
    ///
    /// The packet is logged and returned; nothing is stored.
    #[instrument(level = "debug", skip(self, hex_payload))]
    pub fn live_telemetry(&self, relay_id: &str, hex_payload: &str) -> Result<TelemetryPacket> {
        if relay_id.is_empty() || hex_payload.is_empty() {
            return Err(IngestError::invalid_request("missing payload or relay id"));
        }

        let packet = TelemetryPacket::decode_hex(hex_payload)?;
        info!(
            relay_id,
            packet_id = packet.packet_id,
            speed_kmh = packet.speed_kmh,
            rpm = packet.rpm,
            gear = packet.gear,
            "Live telemetry"
        );
        Ok(packet)
    }

    /// Address the UDP receiver is bound to
    pub fn telemetry_addr(&self) -> SocketAddr {
        self.telemetry_addr
    }

    pub fn telemetry_stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    pub fn telemetry_receiver(&self) -> &ReceiverHandle {
        &self.receiver
    }

    /// Stop the watcher and the UDP receiver.
    pub async fn shutdown(self) {
        self.watch.lock().await.stop();
        let mut receiver = self.receiver;
        receiver.stop();
        receiver.finished().await;
        info!("Lap service stopped");
    }

    async fn read<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreHandle) -> Result<T> + Send + 'static,
    {
        let database = self.database.clone();
        tokio::task::spawn_blocking(move || query(&database.connect()?)).await?
    }
}

async fn ingest_payload(database: Database, payload: Value) -> Result<IngestReport> {
    tokio::task::spawn_blocking(move || {
        let mut store = database.connect()?;
        ingest(&mut store, &payload)
    })
    .await?
}

async fn ingest_file(database: Database, path: &Path) -> Result<IngestReport> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IngestError::file_error(path, e))?;
    let payload: Value = serde_json::from_str(&text)
        .map_err(|e| IngestError::payload_error(path.display().to_string(), e.to_string()))?;
    ingest_payload(database, payload).await
}

/// Feeds watcher discoveries through the normal ingestion path
struct FileIngester {
    database: Database,
}

#[async_trait]
impl FileHandler for FileIngester {
    async fn handle_file(&self, path: &Path) -> Result<()> {
        let report = ingest_file(self.database.clone(), path).await?;
        if !report.skipped_sessions.is_empty() {
            warn!(
                path = %path.display(),
                skipped = report.skipped_sessions.len(),
                "Session file had incomplete sessions"
            );
        }
        info!(
            path = %path.display(),
            sessions = report.uploaded_sessions,
            laps = report.uploaded_laps,
            "Ingested session file"
        );
        Ok(())
    }
}
