use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{CacheCoordinator, GallerySnapshot, SnapshotCache};
use crate::config::GalleryConfig;
use crate::error::Result;
use crate::media::ArtifactFilter;
use crate::orchestration::{
    GenerationScheduler, ProgressBroadcaster, ProgressSubscription, SchedulerStatus,
};
use crate::scan::{DirectoryScanner, FileSystem, RealFs};
use crate::thumbs::{ThumbnailBackend, ThumbnailStore};

#[cfg(feature = "watch")]
use crate::scan::fs_watch::{FsWatchConfig, FsWatchService, NoopFsWatchObserver};

/// Everything that belongs to one scan root: the snapshot cache, the
/// generation scheduler, and the progress channel.
///
/// Separate roots get separate services; nothing here is process-global.
pub struct GalleryService {
    root: PathBuf,
    config: GalleryConfig,
    events: ProgressBroadcaster,
    scheduler: GenerationScheduler,
    coordinator: Arc<CacheCoordinator>,
    shutdown: CancellationToken,
    #[cfg(feature = "watch")]
    watcher: FsWatchService<NoopFsWatchObserver>,
}

impl std::fmt::Debug for GalleryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryService")
            .field("root", &self.root)
            .field("scheduler", &self.scheduler)
            .field("events", &self.events)
            .finish()
    }
}

impl GalleryService {
    /// Service over the real filesystem with the on-disk thumbnail store.
    pub fn new(root: impl Into<PathBuf>, config: GalleryConfig) -> Self {
        let root = root.into();
        let store = ThumbnailStore::new(
            config.cache.thumbnail_dir_for(&root),
            config.thumbnails.clone(),
        );
        Self::with_parts(root, config, Arc::new(RealFs::new()), Arc::new(store))
    }

    /// Service with an injected filesystem and thumbnail backend.
    pub fn with_parts(
        root: impl Into<PathBuf>,
        config: GalleryConfig,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ThumbnailBackend>,
    ) -> Self {
        let root = root.into();
        let shutdown = CancellationToken::new();
        let events = ProgressBroadcaster::new(config.events.subscriber_capacity);
        let cache = Arc::new(SnapshotCache::new());
        let filter = ArtifactFilter::new(config.cache.dir_name.clone());

        let scheduler = GenerationScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&backend),
            events.clone(),
            cache.clone(),
            shutdown.child_token(),
        );
        let coordinator = Arc::new(CacheCoordinator::new(
            root.clone(),
            DirectoryScanner::new(fs, filter.clone()),
            backend,
            scheduler.clone(),
            events.clone(),
            cache,
            config.cache.freshness_window(),
        ));

        Self {
            #[cfg(feature = "watch")]
            watcher: FsWatchService::new(
                FsWatchConfig::from(&config.watch),
                filter,
                Arc::new(NoopFsWatchObserver),
            ),
            root,
            config,
            events,
            scheduler,
            coordinator,
            shutdown,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// Current snapshot; may start background generation for items without
    /// a thumbnail.
    pub async fn get_snapshot(&self) -> GallerySnapshot {
        self.coordinator.get_snapshot().await
    }

    pub async fn force_rescan(&self) -> GallerySnapshot {
        self.coordinator.force_rescan().await
    }

    pub fn invalidate(&self, reason: &str) {
        self.coordinator.invalidate(reason);
    }

    /// Prioritise the given items. Returns how many queued jobs moved.
    pub async fn report_viewport(&self, relative_paths: &[String]) -> usize {
        self.scheduler.report_viewport(relative_paths).await
    }

    pub fn toggle_pause(&self) -> bool {
        self.scheduler.toggle_pause()
    }

    pub fn subscribe_progress(&self) -> ProgressSubscription {
        self.events.subscribe()
    }

    pub async fn cleanup_orphans(&self) -> Result<usize> {
        Ok(self.coordinator.cleanup_orphans().await?)
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await
    }

    /// Number of snapshot rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.coordinator.rebuild_count()
    }

    /// Watch the root and invalidate the snapshot on media changes. No-op if
    /// watching is disabled in the configuration.
    #[cfg(feature = "watch")]
    pub async fn start_watching(&self) -> Result<()> {
        if !self.config.watch.enabled {
            info!(target: "vitrine::watch", "watching disabled by configuration");
            return Ok(());
        }
        self.watcher
            .register_root(self.root.clone(), self.coordinator.clone())
            .await
    }

    /// Stop dispatch and watch tasks. In-flight generation finishes on its
    /// own; queued jobs are abandoned.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        #[cfg(feature = "watch")]
        self.watcher.shutdown().await;
        self.scheduler.wait_idle().await;
        info!(target: "vitrine::cache", root = %self.root.display(), "gallery service stopped");
    }
}
