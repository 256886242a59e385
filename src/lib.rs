//! Lap-timing ingestion for racing simulators.
//!
//! Apex Laps turns the session exports of simulator clients into durable,
//! deduplicated lap records and decodes the small live telemetry packets those
//! clients stream alongside.
//!
//! # Features
//!
//! - **Lenient normalization**: heterogeneous session payloads become canonical
//!   sessions; incomplete ones are skipped and reported, never fatal
//! - **Idempotent storage**: re-delivering the same session never duplicates laps
//! - **Race-free resolution**: drivers, tracks, cars and combos are created once
//!   no matter how many uploads race for them
//! - **Telemetry decoding**: fixed 16-byte little-endian packets over UDP or hex
//! - **Folder watching**: new `*.json` exports are picked up automatically
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use apex_laps::{LapService, ServiceConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     config.init_tracing()?;
//!
//!     let service = LapService::start(config).await?;
//!     let report = service
//!         .ingest(json!({
//!             "track": "Monza",
//!             "players": [{ "name": "alice", "car": "GT3" }],
//!             "sessions": [{ "laps": [{ "time": 95000, "valid": 1 }] }]
//!         }))
//!         .await?;
//!     println!("stored {} laps", report.uploaded_laps);
//!
//!     for best in service.best_laps().await? {
//!         println!("{} @ {} in {}: {}", best.username, best.track, best.car, best.best_time);
//!     }
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod logging;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Ingestion pipeline
pub mod ingest;
pub mod session;
pub mod store;

// Live telemetry
pub mod telemetry;

// Service surfaces
pub mod service;
pub mod watch;

// Core exports
pub use config::ServiceConfig;
pub use error::*;
pub use ingest::{IngestReport, ingest};
pub use service::LapService;

// Pipeline exports
pub use session::{CanonicalLap, CanonicalSession, Normalized, SkipReason, SkippedSession};
pub use store::{BestLap, Database, FastestLap, LapSummary, StoreHandle};
pub use telemetry::{PACKET_SIZE, TelemetryPacket};
pub use watch::{WatchConfig, WatchService};
