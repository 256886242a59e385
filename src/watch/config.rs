//! Persisted watch configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{IngestError, Result};

/// Default location of the persisted record
pub const DEFAULT_WATCH_CONFIG: &str = "config.json";

/// The watch path that survives restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    #[serde(default)]
    pub watch_path: Option<PathBuf>,
}

impl WatchConfig {
    /// Load the record at `path`.
    ///
    /// A missing, unreadable or malformed file is logged and treated as empty.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No persisted watch config");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read watch config");
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not parse watch config");
                Self::default()
            }
        }
    }

    /// Overwrite the record at `path`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| IngestError::config_error(e.to_string(), path))?;
        tokio::fs::write(path, text).await.map_err(|e| IngestError::file_error(path, e))
    }
}
