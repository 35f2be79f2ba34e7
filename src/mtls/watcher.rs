//! Hot-reload file watcher for the whitelist document
//!
//! Watches the directory holding the whitelist and calls
//! [`AllowListStore::reload`] once changes to the file settle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use super::allowlist::AllowListStore;
use crate::{Error, Result};

/// Debounce: wait this long after the last event before reloading.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// File watcher for hot-reloading the whitelist
pub struct WhitelistWatcher {
    /// The underlying watcher
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl WhitelistWatcher {
    /// Start watching the store's backing file.
    ///
    /// Editors often replace files instead of writing in place, so the
    /// parent directory is watched and events are filtered by file name.
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<AllowListStore>, shutdown_rx: broadcast::Receiver<()>) -> Result<Self> {
        let file = store.path().to_path_buf();
        let Some(dir) = watch_dir(&file) else {
            info!(path = %file.display(), "Whitelist directory does not exist, hot-reload disabled");
            return Ok(Self {
                _watcher: Mutex::new(None),
            });
        };

        let (event_tx, event_rx) = mpsc::channel(16);
        let watcher = Self::create_watcher(event_tx, &dir, file.clone())?;
        Self::spawn_reload_task(store, event_rx, shutdown_rx);
        info!(path = %file.display(), "Watching whitelist for changes");

        Ok(Self {
            _watcher: Mutex::new(Some(watcher)),
        })
    }

    fn create_watcher(
        event_tx: mpsc::Sender<()>,
        dir: &Path,
        file: PathBuf,
    ) -> Result<RecommendedWatcher> {
        let file_name = file.file_name().map(ToOwned::to_owned);
        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let is_relevant = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());

                    if is_relevant {
                        debug!(paths = ?event.paths, kind = ?event.kind, "Whitelist file change");
                        // Full channel means a reload is already pending
                        let _ = event_tx.try_send(());
                    }
                }
                Err(e) => {
                    error!(error = %e, "Whitelist watcher error");
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| Error::Internal(format!("Failed to create file watcher: {e}")))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Internal(format!("Failed to watch '{}': {e}", dir.display())))?;

        Ok(watcher)
    }

    fn spawn_reload_task(
        store: Arc<AllowListStore>,
        mut event_rx: mpsc::Receiver<()>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tokio::spawn(async move {
            let mut last_event: Option<Instant> = None;
            let mut interval = tokio::time::interval(Duration::from_millis(100));

            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        last_event = Some(Instant::now());
                    }
                    _ = interval.tick() => {
                        if last_event.is_some_and(|last| last.elapsed() >= DEBOUNCE) {
                            last_event = None;
                            // Small local file; blocking read is bounded.
                            let store = Arc::clone(&store);
                            if let Err(e) = tokio::task::spawn_blocking(move || store.reload()).await {
                                error!(error = %e, "Whitelist reload task failed");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Whitelist watcher shutting down");
                        break;
                    }
                }
            }
        });
    }
}

/// Directory to watch for `file`; `None` when it does not exist.
fn watch_dir(file: &Path) -> Option<PathBuf> {
    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.is_dir().then_some(dir)
}
