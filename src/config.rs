//! Service configuration loaded from YAML

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::util::TryInitError;

use crate::watch::DEFAULT_WATCH_CONFIG;
use crate::{IngestError, Result};

/// Runtime settings for [`crate::LapService`]
///
/// Every key is optional:
///
/// ```yaml
/// database_path: apex.db
/// watch_config_path: config.json
/// telemetry_bind_address: 0.0.0.0
/// telemetry_port: 12000
/// log_level: info
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub watch_config_path: PathBuf,
    pub telemetry_bind_address: IpAddr,
    /// `0` binds an ephemeral port
    pub telemetry_port: u16,
    /// Fallback tracing directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("apex.db"),
            watch_config_path: PathBuf::from(DEFAULT_WATCH_CONFIG),
            telemetry_bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            telemetry_port: 12000,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IngestError::file_error(path, e))?;
        Self::from_yaml(&text).map_err(|e| match e {
            IngestError::Config { reason, .. } => IngestError::config_error(reason, path),
            other => other,
        })
    }

    /// Parse a YAML document; an empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|e| IngestError::config_error(e.to_string(), ""))
    }

    /// Install the global tracing subscriber with `log_level` as the fallback
    /// directive.
    pub fn init_tracing(&self) -> std::result::Result<(), TryInitError> {
        crate::logging::init_tracing(&self.log_level)
    }

    /// Address the UDP telemetry receiver binds to
    pub fn telemetry_addr(&self) -> SocketAddr {
        SocketAddr::new(self.telemetry_bind_address, self.telemetry_port)
    }
}
