//! Filesystem watch pipeline for gallery roots.
//!
//! A thin wrapper around `notify` that reduces raw notifications to media
//! additions and removals, debounces them into batches, and turns each
//! flushed batch into a single cache invalidation. The watcher never touches
//! the snapshot itself.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use crate::cache::InvalidationSink;
use crate::config::WatchConfig;
use crate::error::{GalleryError, Result};
use crate::media::{ArtifactFilter, classify};
use crate::scan::scanner::settings::{DEPENDENCY_DIR_NAME, HIDDEN_MARKER};

/// Configuration knobs for watch processing.
#[derive(Clone, Debug)]
pub struct FsWatchConfig {
    /// Debounce window for coalescing rapid event bursts per root.
    pub debounce_window: Duration,
    /// Maximum number of changes bundled into a single flush.
    pub max_batch_events: usize,
}

impl Default for FsWatchConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(250),
            max_batch_events: 1024,
        }
    }
}

impl From<&WatchConfig> for FsWatchConfig {
    fn from(cfg: &WatchConfig) -> Self {
        Self {
            debounce_window: Duration::from_millis(cfg.debounce_window_ms.max(1)),
            max_batch_events: cfg.max_batch_events.max(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchChangeKind {
    Added,
    Removed,
}

/// A media file appeared under or disappeared from a watched root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchChange {
    pub kind: WatchChangeKind,
    pub path: PathBuf,
}

/// Observer hook for surfacing watcher errors.
pub trait FsWatchObserver: Send + Sync {
    fn on_error(&self, root: &Path, error: &str);
}

/// Observer that ignores errors; the watch loop already logs them.
pub struct NoopFsWatchObserver;

impl FsWatchObserver for NoopFsWatchObserver {
    fn on_error(&self, _root: &Path, _error: &str) {}
}

impl fmt::Debug for NoopFsWatchObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoopFsWatchObserver")
    }
}

/// Debounces filesystem notifications into cache invalidations.
pub struct FsWatchService<O: FsWatchObserver = NoopFsWatchObserver> {
    config: FsWatchConfig,
    filter: ArtifactFilter,
    observer: Arc<O>,
    roots: Arc<RwLock<HashMap<PathBuf, RootWatch>>>,
}

impl<O: FsWatchObserver + 'static> fmt::Debug for FsWatchService<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FsWatchService");
        debug
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("observer_type", &std::any::type_name::<O>());

        match self.roots.try_read() {
            Ok(guard) => {
                debug.field("root_count", &guard.len());
            }
            Err(_) => {
                debug.field("roots", &"<locked>");
            }
        }

        debug.finish()
    }
}

impl<O: FsWatchObserver + 'static> FsWatchService<O> {
    pub fn new(config: FsWatchConfig, filter: ArtifactFilter, observer: Arc<O>) -> Self {
        Self {
            config,
            filter,
            observer,
            roots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start watching `root`. Each debounced batch of media changes results
    /// in one `sink.invalidate(..)`. Registering the same root twice is a
    /// no-op.
    pub async fn register_root(&self, root: PathBuf, sink: Arc<dyn InvalidationSink>) -> Result<()> {
        let root = resolve_root(root);
        if self.roots.read().await.contains_key(&root) {
            return Ok(());
        }

        let capacity = self.config.max_batch_events.max(64) * 4;
        let (tx, rx) = mpsc::channel::<WatchMessage>(capacity);

        let watcher_root = root.clone();
        let watcher = spawn_blocking(move || init_watcher(&watcher_root, tx))
            .await
            .map_err(|err| {
                GalleryError::Watch(format!("watcher initialization panicked: {err}"))
            })?
            .inspect_err(|err| self.observer.on_error(&root, &err.to_string()))?;

        let mut guard = self.roots.write().await;
        if guard.contains_key(&root) {
            return Ok(());
        }
        let flush_task = spawn_watch_loop(
            root.clone(),
            self.filter.clone(),
            Arc::clone(&self.observer),
            sink,
            rx,
            self.config.clone(),
        );
        info!(target: "vitrine::watch", root = %root.display(), "watching root");
        guard.insert(
            root,
            RootWatch {
                _watcher: watcher,
                flush_task,
            },
        );
        Ok(())
    }

    /// Stop watching `root`.
    pub async fn unregister_root(&self, root: &Path) {
        let root = resolve_root(root.to_path_buf());
        if let Some(watch) = self.roots.write().await.remove(&root) {
            watch.shutdown();
        }
    }

    /// Tear down all registered watchers.
    pub async fn shutdown(&self) {
        let mut guard = self.roots.write().await;
        let watches: Vec<_> = guard.drain().map(|(_, watch)| watch).collect();
        drop(guard);
        for watch in watches {
            watch.shutdown();
        }
    }

    pub async fn watcher_count(&self) -> usize {
        self.roots.read().await.len()
    }
}

struct RootWatch {
    // Dropping the watcher stops the notify stream.
    _watcher: RecommendedWatcher,
    flush_task: JoinHandle<()>,
}

impl RootWatch {
    fn shutdown(self) {
        self.flush_task.abort();
    }
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

fn spawn_watch_loop<O: FsWatchObserver + 'static>(
    root: PathBuf,
    filter: ArtifactFilter,
    observer: Arc<O>,
    sink: Arc<dyn InvalidationSink>,
    mut rx: mpsc::Receiver<WatchMessage>,
    config: FsWatchConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: Vec<WatchChange> = Vec::new();

        loop {
            let msg = if pending.is_empty() {
                rx.recv().await
            } else {
                match timeout(config.debounce_window, rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        flush_pending(&root, &mut pending, sink.as_ref());
                        continue;
                    }
                }
            };

            let Some(msg) = msg else {
                flush_pending(&root, &mut pending, sink.as_ref());
                break;
            };

            match msg {
                WatchMessage::Event(event) => {
                    pending.extend(convert_event(&root, &filter, &event));
                    if pending.len() >= config.max_batch_events {
                        flush_pending(&root, &mut pending, sink.as_ref());
                    }
                }
                WatchMessage::Error(error) => {
                    warn!(target: "vitrine::watch", root = %root.display(), %error, "watch error");
                    observer.on_error(&root, &error);
                    pending.clear();
                    sink.invalidate("filesystem watch error; full rescan required");
                }
            }
        }
    })
}

fn flush_pending(root: &Path, pending: &mut Vec<WatchChange>, sink: &dyn InvalidationSink) {
    if pending.is_empty() {
        return;
    }
    let changes = std::mem::take(pending);
    let reason = describe_batch(&changes);
    debug!(target: "vitrine::watch", root = %root.display(), changes = changes.len(), "flushing changes");
    sink.invalidate(&reason);
}

/// Human-readable invalidation reason naming the change counts.
pub fn describe_batch(changes: &[WatchChange]) -> String {
    let added = changes
        .iter()
        .filter(|c| c.kind == WatchChangeKind::Added)
        .count();
    let removed = changes.len() - added;
    format!("filesystem change: {added} added, {removed} removed")
}

/// Reduce a raw notification to media additions and removals under `root`.
///
/// Removing or renaming a directory moves every media file beneath it, so
/// those events are reported against the directory path itself.
pub fn convert_event(root: &Path, filter: &ArtifactFilter, event: &Event) -> Vec<WatchChange> {
    let kinds: Vec<WatchChangeKind> = match event.kind {
        EventKind::Create(_) => vec![WatchChangeKind::Added],
        EventKind::Remove(_) => vec![WatchChangeKind::Removed],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![WatchChangeKind::Removed],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![WatchChangeKind::Added],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![WatchChangeKind::Removed, WatchChangeKind::Added]
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Direction unknown; decide by whether the path is still there.
            return event
                .paths
                .iter()
                .filter_map(|path| {
                    let kind = if path.exists() {
                        WatchChangeKind::Added
                    } else {
                        WatchChangeKind::Removed
                    };
                    media_change(root, filter, path, kind)
                        .or_else(|| directory_change(root, filter, path, kind, false))
                })
                .collect();
        }
        _ => return Vec::new(),
    };

    let moves_directories = matches!(
        event.kind,
        EventKind::Remove(RemoveKind::Any | RemoveKind::Folder | RemoveKind::Other)
            | EventKind::Modify(ModifyKind::Name(_))
    );
    // The source side of a rename is gone; the destination tells us its type.
    let known_folder = matches!(event.kind, EventKind::Remove(RemoveKind::Folder))
        || (matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)))
            && event.paths.iter().any(|path| path.is_dir()));

    event
        .paths
        .iter()
        .zip(kinds.iter().cycle())
        .filter_map(|(path, kind)| {
            let change = media_change(root, filter, path, *kind);
            if change.is_none() && moves_directories {
                return directory_change(root, filter, path, *kind, known_folder);
            }
            change
        })
        .collect()
}

fn media_change(
    root: &Path,
    filter: &ArtifactFilter,
    path: &Path,
    kind: WatchChangeKind,
) -> Option<WatchChange> {
    let relative = sanitize_relative(root, path)?;
    let name = relative.file_name()?.to_string_lossy().into_owned();
    classify(&name)?;
    if relative.parent().is_some_and(has_excluded_segment) || filter.matches(&relative, &name) {
        return None;
    }
    Some(WatchChange {
        kind,
        path: root.join(relative),
    })
}

// Paths with an extension are taken to be files unless known otherwise.
fn directory_change(
    root: &Path,
    filter: &ArtifactFilter,
    path: &Path,
    kind: WatchChangeKind,
    known_folder: bool,
) -> Option<WatchChange> {
    if !(known_folder || path.is_dir() || path.extension().is_none()) {
        return None;
    }
    let relative = sanitize_relative(root, path)?;
    if has_excluded_segment(&relative) || filter.matches(&relative, "") {
        return None;
    }
    Some(WatchChange {
        kind,
        path: root.join(relative),
    })
}

fn has_excluded_segment(path: &Path) -> bool {
    path.components().any(|c| {
        let segment = c.as_os_str().to_string_lossy();
        segment.starts_with(HIDDEN_MARKER) || segment == DEPENDENCY_DIR_NAME
    })
}

fn sanitize_relative(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    let mut clean = PathBuf::new();
    for component in rel.components() {
        match component {
            Component::Normal(seg) => clean.push(seg),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

fn resolve_root(root: PathBuf) -> PathBuf {
    let absolute = if root.is_absolute() {
        root
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(root)
    };
    std::fs::canonicalize(&absolute).unwrap_or(absolute)
}

fn init_watcher(root: &Path, tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    let path_clone = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let Err(err) = tx.blocking_send(WatchMessage::Event(event)) {
                    warn!(
                        target: "vitrine::watch",
                        "fs_watch channel send failed for {}: {}",
                        path_clone.display(),
                        err
                    );
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchMessage::Error(err.to_string()));
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| {
        GalleryError::Watch(format!(
            "failed to create watcher for {}: {err}",
            root.display()
        ))
    })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| GalleryError::Watch(format!("failed to watch {}: {err}", root.display())))?;

    Ok(watcher)
}
