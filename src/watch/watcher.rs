// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{EventKind as FsEventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus};

/// Base file names whose writes are never source changes (generated doc
/// stubs and the like).
const IGNORED_BASENAMES: &[&str] = &["doc.go"];

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle stops file watching and ends
/// the forwarding loop.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher over the project tree rooted at `root`,
/// publishing a `file_changed` event on the bus for every relevant write.
///
/// Directories named in `ignore_dirs` (relative to `root`) are skipped
/// entirely during registration, not merely filtered. Registration walks
/// the tree once at startup; subdirectories created later are not added to
/// the watch set.
///
/// Watcher errors are logged, not fatal; the forwarding loop ends when the
/// notify channel closes.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    ignore_dirs: &[String],
    bus: EventBus,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let ignored: Vec<PathBuf> = ignore_dirs.iter().map(|d| root.join(d)).collect();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if event_tx.send(res).is_err() {
                // Forwarding loop is gone; nothing useful left to do here.
            }
        },
        notify::Config::default(),
    )
    .context("cannot create watcher")?;

    register_tree(&mut watcher, &root, &ignored).context("cannot walk filetree")?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(async move {
        while let Some(res) = event_rx.recv().await {
            match res {
                Ok(event) if is_write(&event.kind) => {
                    for path in &event.paths {
                        if is_ignored_basename(path) {
                            debug!("ignoring documentation change: {:?}", path);
                        } else {
                            bus.publish(Event::file_changed(path.display().to_string()))
                                .await;
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "file watch error");
                }
            }
        }
        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Register `dir` and all its non-ignored subdirectories, one non-recursive
/// watch per directory so ignored subtrees are never entered.
fn register_tree(
    watcher: &mut RecommendedWatcher,
    dir: &Path,
    ignored: &[PathBuf],
) -> Result<()> {
    if ignored.iter().any(|skip| skip == dir) {
        debug!("skipping directory: {:?}", dir);
        return Ok(());
    }

    debug!("watching directory: {:?}", dir);
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("cannot add directory {:?} to watcher", dir))?;

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("cannot read directory {:?}", dir))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot read entry in {:?}", dir))?;
        let path = entry.path();
        if path.is_dir() {
            register_tree(watcher, &path, ignored)?;
        }
    }

    Ok(())
}

fn is_write(kind: &FsEventKind) -> bool {
    matches!(
        kind,
        FsEventKind::Modify(ModifyKind::Data(_)) | FsEventKind::Modify(ModifyKind::Any)
    )
}

fn is_ignored_basename(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| IGNORED_BASENAMES.contains(&name))
}
