use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::snapshot::{GallerySnapshot, SnapshotCache, SnapshotEntry};
use crate::error::StoreError;
use crate::media::MediaDescriptor;
use crate::orchestration::{GenerationScheduler, ProgressBroadcaster, ProgressEvent};
use crate::scan::scanner::DirectoryScanner;
use crate::thumbs::{ThumbnailBackend, ThumbnailVariant};

/// Receives cache invalidations from the filesystem watcher.
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, reason: &str);
}

/// Owns the gallery snapshot for one root: serves it while fresh, rebuilds
/// it when stale, and hands unresolved items to the scheduler.
pub struct CacheCoordinator {
    root: PathBuf,
    scanner: DirectoryScanner,
    backend: Arc<dyn ThumbnailBackend>,
    scheduler: GenerationScheduler,
    events: ProgressBroadcaster,
    cache: Arc<SnapshotCache>,
    freshness_window: Duration,
    refresh: Mutex<()>,
    rebuilds: AtomicU64,
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("root", &self.root)
            .field("freshness_window", &self.freshness_window)
            .field("rebuilds", &self.rebuild_count())
            .finish()
    }
}

impl CacheCoordinator {
    pub fn new(
        root: PathBuf,
        scanner: DirectoryScanner,
        backend: Arc<dyn ThumbnailBackend>,
        scheduler: GenerationScheduler,
        events: ProgressBroadcaster,
        cache: Arc<SnapshotCache>,
        freshness_window: Duration,
    ) -> Self {
        Self {
            root,
            scanner,
            backend,
            scheduler,
            events,
            cache,
            freshness_window,
            refresh: Mutex::new(()),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of full rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Serve the cached snapshot while fresh; otherwise rebuild it. Concurrent
    /// callers during a rebuild wait for it and share the result.
    pub async fn get_snapshot(&self) -> GallerySnapshot {
        if let Some(snapshot) = self.cache.fresh(self.freshness_window) {
            return snapshot;
        }
        let _guard = self.refresh.lock().await;
        if let Some(snapshot) = self.cache.fresh(self.freshness_window) {
            debug!(target: "vitrine::cache", "snapshot rebuilt by a concurrent caller");
            return snapshot;
        }
        self.rebuild().await
    }

    /// Mark the snapshot stale and announce it. The rescan happens on the
    /// next [`CacheCoordinator::get_snapshot`].
    pub fn invalidate(&self, reason: &str) {
        self.cache.mark_stale();
        info!(target: "vitrine::cache", root = %self.root.display(), reason, "snapshot invalidated");
        self.events.publish(ProgressEvent::CacheInvalidated {
            reason: reason.to_string(),
        });
    }

    pub async fn force_rescan(&self) -> GallerySnapshot {
        self.invalidate("manual rescan");
        self.get_snapshot().await
    }

    pub async fn cleanup_orphans(&self) -> Result<usize, StoreError> {
        self.backend.cleanup_orphans(&self.root).await
    }

    async fn rebuild(&self) -> GallerySnapshot {
        let started_epoch = self.cache.epoch();

        match self.cleanup_orphans().await {
            Ok(0) => {}
            Ok(removed) => {
                info!(target: "vitrine::cache", removed, "orphaned thumbnails cleaned up")
            }
            Err(err) => warn!(target: "vitrine::cache", error = %err, "orphan cleanup failed"),
        }

        let outcome = self.scanner.scan(&self.root, &self.events).await;
        for err in &outcome.errors {
            warn!(
                target: "vitrine::cache",
                path = %err.path.display(),
                error = %err.message,
                "scan skipped a subtree"
            );
        }

        let mut entries = Vec::with_capacity(outcome.descriptors.len());
        let mut missing: Vec<MediaDescriptor> = Vec::new();
        for descriptor in outcome.descriptors {
            let ready = self.backend.exists(&descriptor, ThumbnailVariant::Full).await;
            if !ready {
                missing.push(descriptor.clone());
            }
            entries.push(SnapshotEntry {
                thumbnail_url: self
                    .backend
                    .url_for(&descriptor.relative_path, ThumbnailVariant::Full),
                descriptor,
                thumbnail_ready: ready,
            });
        }

        let snapshot = GallerySnapshot::assemble(self.root.clone(), entries, Utc::now());
        self.cache.store(snapshot.clone(), started_epoch);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);

        missing.sort_by(|a, b| {
            (a.directory.as_str(), a.name.as_str()).cmp(&(b.directory.as_str(), b.name.as_str()))
        });
        let pending = missing.len();
        let queued = self.scheduler.enqueue_background(missing).await;

        info!(
            target: "vitrine::cache",
            root = %self.root.display(),
            total = snapshot.total_count,
            pending,
            queued,
            "snapshot rebuilt"
        );
        snapshot
    }
}

impl InvalidationSink for CacheCoordinator {
    fn invalidate(&self, reason: &str) {
        CacheCoordinator::invalidate(self, reason);
    }
}
