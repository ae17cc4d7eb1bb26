//! Analysis Directory Watching
//!
//! Reports changes to analysis files so the snapshot can be reloaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::loader::is_analysis_file;

/// Events from the file watcher
#[derive(Debug)]
pub enum WatcherEvent {
    AnalysisFileChanged(PathBuf),
    WatcherError(notify::Error),
}

/// Keeps the underlying watcher alive; dropping it stops the events
pub struct AnalysisWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for AnalysisWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisWatcher")
            .field("root", &self.root)
            .finish()
    }
}

impl AnalysisWatcher {
    /// Watch `root` recursively for created, modified or removed analysis files
    pub fn start(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatcherEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) =
                        event.kind
                    {
                        for path in event.paths {
                            if is_analysis_file(&path) {
                                let _ = tx.send(WatcherEvent::AnalysisFileChanged(path));
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatcherEvent::WatcherError(e));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        Ok((
            Self {
                _watcher: watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Wait for the next burst of changes.
///
/// After the first change arrives, further events are collected for
/// `debounce` so one reload covers a whole analyzer run. Returns `None`
/// once the watcher is gone.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<WatcherEvent>,
    debounce: Duration,
) -> Option<Vec<PathBuf>> {
    let mut changed = Vec::new();

    while changed.is_empty() {
        match rx.recv().await? {
            WatcherEvent::AnalysisFileChanged(path) => changed.push(path),
            WatcherEvent::WatcherError(e) => log::error!("Analysis watcher error: {}", e),
        }
    }

    tokio::time::sleep(debounce).await;

    while let Ok(event) = rx.try_recv() {
        match event {
            WatcherEvent::AnalysisFileChanged(path) => changed.push(path),
            WatcherEvent::WatcherError(e) => log::error!("Analysis watcher error: {}", e),
        }
    }

    changed.sort();
    changed.dedup();
    Some(changed)
}
