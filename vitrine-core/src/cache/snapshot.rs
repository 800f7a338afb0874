use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::media::MediaDescriptor;
use crate::orchestration::JobObserver;

/// One media item as presented to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub descriptor: MediaDescriptor,
    pub thumbnail_ready: bool,
    /// Where the full thumbnail is (or will be) served from.
    pub thumbnail_url: String,
}

/// Cached scan result, grouped by directory and ordered by name within each
/// directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySnapshot {
    pub root_path: PathBuf,
    pub total_count: usize,
    pub by_directory: BTreeMap<String, Vec<SnapshotEntry>>,
    pub captured_at: DateTime<Utc>,
}

impl GallerySnapshot {
    pub fn assemble(
        root_path: PathBuf,
        entries: impl IntoIterator<Item = SnapshotEntry>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut by_directory: BTreeMap<String, Vec<SnapshotEntry>> = BTreeMap::new();
        let mut total_count = 0;
        for entry in entries {
            total_count += 1;
            by_directory
                .entry(entry.descriptor.directory.clone())
                .or_default()
                .push(entry);
        }
        for items in by_directory.values_mut() {
            items.sort_by(|a, b| {
                a.descriptor
                    .name
                    .cmp(&b.descriptor.name)
                    .then_with(|| a.descriptor.relative_path.cmp(&b.descriptor.relative_path))
            });
        }
        Self {
            root_path,
            total_count,
            by_directory,
            captured_at,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.by_directory.values().flatten()
    }

    pub fn ready_count(&self) -> usize {
        self.entries().filter(|e| e.thumbnail_ready).count()
    }

    fn mark_ready(&mut self, descriptor: &MediaDescriptor) -> bool {
        let Some(items) = self.by_directory.get_mut(&descriptor.directory) else {
            return false;
        };
        match items
            .iter_mut()
            .find(|e| e.descriptor.relative_path == descriptor.relative_path)
        {
            Some(entry) => {
                entry.thumbnail_ready = true;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct CachedSnapshot {
    snapshot: GallerySnapshot,
    stored_at: Instant,
    stale: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    current: Option<CachedSnapshot>,
    /// Bumped by every invalidation.
    epoch: u64,
}

/// Holder for the single current snapshot.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    state: RwLock<CacheState>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached snapshot if it is younger than `window` and not stale.
    pub fn fresh(&self, window: Duration) -> Option<GallerySnapshot> {
        let state = self.state.read().ok()?;
        let cached = state.current.as_ref()?;
        (!cached.stale && cached.stored_at.elapsed() < window).then(|| cached.snapshot.clone())
    }

    /// The cached snapshot regardless of age.
    pub fn current(&self) -> Option<GallerySnapshot> {
        let state = self.state.read().ok()?;
        state.current.as_ref().map(|c| c.snapshot.clone())
    }

    pub fn epoch(&self) -> u64 {
        self.state.read().map(|s| s.epoch).unwrap_or(0)
    }

    /// Replace the snapshot. If an invalidation arrived after `started_epoch`
    /// the new snapshot is stored already stale.
    pub fn store(&self, snapshot: GallerySnapshot, started_epoch: u64) {
        if let Ok(mut state) = self.state.write() {
            let stale = state.epoch != started_epoch;
            state.current = Some(CachedSnapshot {
                snapshot,
                stored_at: Instant::now(),
                stale,
            });
        }
    }

    pub fn mark_stale(&self) {
        if let Ok(mut state) = self.state.write() {
            state.epoch += 1;
            if let Some(cached) = state.current.as_mut() {
                cached.stale = true;
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.state
            .read()
            .map(|s| s.current.as_ref().is_none_or(|c| c.stale))
            .unwrap_or(true)
    }
}

impl JobObserver for SnapshotCache {
    fn on_thumbnail_ready(&self, descriptor: &MediaDescriptor) {
        if let Ok(mut state) = self.state.write()
            && let Some(cached) = state.current.as_mut()
        {
            cached.snapshot.mark_ready(descriptor);
        }
    }
}
