//! # Watch Service
//!
//! Watches one directory for new session files and feeds each one to a
//! [`FileHandler`]. The active path is persisted in a [`WatchConfig`] record so
//! that it survives restarts.
//!
//! ```text
//! notify thread ──(new *.json path)──► mpsc ──► watch task ──► FileHandler
//!                                                  ▲
//!                                     CancellationToken (stop / replace)
//! ```
//!
//! Only files that appear after watching starts are handed over. A file appears
//! either by being created in the directory or by being moved into it. The
//! extension check is case-insensitive, and a file is read once its size has
//! stopped changing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{IngestError, Result};

pub mod config;

pub use config::{DEFAULT_WATCH_CONFIG, WatchConfig};

const SETTLE_INTERVAL: Duration = Duration::from_millis(100);
const SETTLE_MAX_POLLS: usize = 20;

/// Receives every new session file seen by the watcher.
#[async_trait]
pub trait FileHandler: Send + Sync + 'static {
    async fn handle_file(&self, path: &Path) -> Result<()>;
}

/// Owner of the active watch path, its watcher and the persisted record
pub struct WatchService {
    config_path: PathBuf,
    handler: Arc<dyn FileHandler>,
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WatchService {
    /// Create an idle service persisting to `config_path`.
    pub fn new(config_path: impl Into<PathBuf>, handler: Arc<dyn FileHandler>) -> Self {
        Self { config_path: config_path.into(), handler, active: None }
    }

    /// Resume watching the persisted path, if there is one.
    ///
    /// A persisted path that no longer exists, or that cannot be watched, is
    /// logged and skipped; the record is left as it is.
    pub fn restore(&mut self) {
        let handler = Arc::clone(&self.handler);
        self.restore_with(|path| start_watch(path, handler));
    }

    fn restore_with(&mut self, start: impl FnOnce(PathBuf) -> Result<ActiveWatch>) {
        let Some(path) = WatchConfig::load(&self.config_path).watch_path else {
            return;
        };

        if !path.is_dir() {
            warn!(path = %path.display(), "Persisted watch path no longer exists, ignoring");
            return;
        }

        match start(path.clone()) {
            Ok(active) => self.active = Some(active),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Could not resume watching persisted path, continuing without a watch"
            ),
        }
    }

    /// Replace the watched directory.
    ///
    /// The path must exist and be a directory. On any failure the previous
    /// watcher, path and persisted record are left untouched.
    pub async fn set_watch_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(IngestError::config_error("watch path is not a directory", path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::config_error("watch path does not exist", path));
            }
            Err(e) => return Err(IngestError::file_error(path, e)),
        }

        let replacement = start_watch(path.clone(), Arc::clone(&self.handler))?;
        WatchConfig { watch_path: Some(path) }.save(&self.config_path).await?;

        // Dropping the previous watch cancels its task
        self.active = Some(replacement);
        Ok(())
    }

    /// Directory currently being watched
    pub fn watch_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    /// Stop watching without touching the persisted record.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            info!(path = %active.path.display(), "Stopped watching");
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

fn start_watch(path: PathBuf, handler: Arc<dyn FileHandler>) -> Result<ActiveWatch> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_arrival(&event.kind) => {
            for path in event.paths.into_iter().filter(|p| is_session_file(p)) {
                // Receiver gone means the watch is shutting down
                let _ = tx.send(path);
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Watcher reported an error"),
    })
    .map_err(|e| IngestError::watch_error("create watcher", e))?;

    watcher
        .watch(&path, RecursiveMode::NonRecursive)
        .map_err(|e| IngestError::watch_error(format!("watch {}", path.display()), e))?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_task(path.clone(), rx, handler, cancel.clone()));

    info!(path = %path.display(), "Watching for new session files");
    Ok(ActiveWatch { path, _watcher: watcher, cancel })
}

async fn watch_task(
    root: PathBuf,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    handler: Arc<dyn FileHandler>,
    cancel: CancellationToken,
) {
    loop {
        let path = tokio::select! {
            _ = cancel.cancelled() => break,
            path = rx.recv() => match path {
                Some(path) => path,
                None => break,
            },
        };

        info!(path = %path.display(), "New session file detected");
        wait_until_settled(&path).await;
        if let Err(e) = handler.handle_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to ingest session file");
        }
    }

    debug!(root = %root.display(), "Watch task stopped");
}

/// Wait until the file size stops changing so a half-written export is not read.
async fn wait_until_settled(path: &Path) {
    let mut last = None;
    for _ in 0..SETTLE_MAX_POLLS {
        let size = tokio::fs::metadata(path).await.ok().map(|m| m.len());
        if size.is_some() && size == last {
            return;
        }
        last = size;
        tokio::time::sleep(SETTLE_INTERVAL).await;
    }
    debug!(path = %path.display(), "File still changing, reading anyway");
}

fn is_arrival(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)))
}

/// Whether `path` names a session file (`*.json`, any case).
pub fn is_session_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
