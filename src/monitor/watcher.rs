//! Filesystem notifications for the watched target.
//!
//! A `notify` watcher on the target's directory forwards events over a
//! bounded channel. The watch loop hands each actionable event to
//! [`ChangeMonitor::on_change`] on its own task, so a running cycle never
//! delays delivery; its guard decides what gets dropped.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ChangeMonitor;

/// Channel depth between the notify thread and the watch loop.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to resolve target {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target {} has no parent directory", .0.display())]
    NoParent(PathBuf),
}

/// Coarse event kind; only `ContentModified` starts a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Data written, or the path replaced by a create/rename.
    ContentModified,
    Removed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Both))
        | EventKind::Create(_) => ChangeKind::ContentModified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Other,
    }
}

/// Flatten one notify event into per-path changes.
pub fn to_changes(event: &notify::Event) -> Vec<ChangeEvent> {
    let kind = classify(&event.kind);
    let paths: &[PathBuf] = match event.kind {
        // [from, to]: only the destination now holds new content.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(std::slice::from_ref).unwrap_or(&[])
        }
        _ => &event.paths,
    };
    paths
        .iter()
        .map(|path| ChangeEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

/// Start watching the directory that holds `target`.
///
/// The returned watcher must be kept alive for events to flow.
pub fn watch_target(
    target: &Path,
) -> Result<(RecommendedWatcher, mpsc::Receiver<ChangeEvent>), WatchError> {
    let canonical = std::fs::canonicalize(target).map_err(|source| WatchError::Resolve {
        path: target.to_path_buf(),
        source,
    })?;
    let dir = canonical
        .parent()
        .ok_or_else(|| WatchError::NoParent(canonical.clone()))?
        .to_path_buf();

    let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                for change in to_changes(&event) {
                    if tx.try_send(change).is_err() {
                        debug!("change notification dropped, channel full or closed");
                    }
                }
            }
            Err(e) => warn!("watch error: {e}"),
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

/// Watch until Ctrl-C.
pub async fn run(monitor: Arc<ChangeMonitor>) -> Result<(), WatchError> {
    run_until(monitor, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Watch until `shutdown` resolves or the watcher goes away.
pub async fn run_until(
    monitor: Arc<ChangeMonitor>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), WatchError> {
    let (_watcher, mut events) = watch_target(monitor.target())?;
    info!(target_file = %monitor.target().display(), "watching for failures");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            maybe = events.recv() => {
                let Some(event) = maybe else {
                    warn!("watcher channel closed");
                    break;
                };
                if event.kind != ChangeKind::ContentModified {
                    continue;
                }
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    let disposition = monitor.on_change(&event.path).await;
                    debug!(path = %event.path.display(), ?disposition, "notification handled");
                });
            }
            _ = &mut shutdown => {
                info!("stopping watch");
                break;
            }
        }
    }
    Ok(())
}
