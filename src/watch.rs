use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Creates a watcher for a tree source and returns a receiver for change
/// events. The watcher must be kept alive for events to be received.
///
/// Directory sources are watched recursively. For a document we watch its
/// parent directory, since editors often save by writing a temp file and
/// renaming it over the original, and filter events to the document's name.
pub fn watch_source(path: &Path) -> Result<(RecommendedWatcher, Receiver<()>)> {
    if path.is_dir() {
        return watch_dir(path);
    }

    let (tx, rx) = mpsc::channel();
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            // Access events fire on every read, including our own reloads.
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let ours = event.paths.iter().any(|p| {
                p.file_name()
                    .is_some_and(|f| f.to_string_lossy() == filename)
            });
            if ours {
                let _ = tx.send(());
            }
        }
    })
    .context("failed to create file watcher")?;

    let watch_path = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    watcher
        .watch(watch_path, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_path.display()))?;

    Ok((watcher, rx))
}

fn watch_dir(dir: &Path) -> Result<(RecommendedWatcher, Receiver<()>)> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let _ = tx.send(());
        }
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;

    Ok((watcher, rx))
}

/// Waits for a change event with timeout.
/// Returns true if an event was received, false on timeout.
pub fn wait_for_change(rx: &Receiver<()>, timeout: Duration) -> bool {
    rx.recv_timeout(timeout).is_ok()
}

/// Drains any pending events from the receiver.
pub fn drain_events(rx: &Receiver<()>) {
    while rx.try_recv().is_ok() {}
}
