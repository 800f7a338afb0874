use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scan::scanner::settings::DEFAULT_CACHE_DIR_NAME;

/// Every knob the core reads. All fields carry defaults so a partial file (or
/// none at all) yields a working configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Scan root. Usually supplied on the command line rather than in a file.
    pub root: Option<PathBuf>,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub thumbnails: ThumbnailConfig,
    pub watch: WatchConfig,
    pub events: EventsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory name for generated artifacts under the root. Directories
    /// with this name are never scanned.
    pub dir_name: String,
    /// Explicit thumbnail directory; defaults to `<root>/<dir_name>/thumbnails`.
    pub thumbnail_dir: Option<PathBuf>,
    /// How long a snapshot is served without rescanning.
    pub freshness_window_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir_name: DEFAULT_CACHE_DIR_NAME.to_string(),
            thumbnail_dir: None,
            freshness_window_ms: 30_000,
        }
    }
}

impl CacheConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }

    pub fn thumbnail_dir_for(&self, root: &Path) -> PathBuf {
        self.thumbnail_dir
            .clone()
            .unwrap_or_else(|| root.join(&self.dir_name).join("thumbnails"))
    }
}

/// Batch sizing, pacing, and progress throttling for thumbnail generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Batch size while the run has at most `small_threshold` jobs.
    pub small_batch: usize,
    /// Batch size between the two thresholds.
    pub medium_batch: usize,
    /// Batch size once the run exceeds `large_threshold` jobs.
    pub large_batch: usize,
    pub small_threshold: usize,
    pub large_threshold: usize,
    /// Pause between batches for runs up to `large_threshold` jobs.
    pub delay_ms: u64,
    /// Pause between batches for runs above `large_threshold` jobs.
    pub large_delay_ms: u64,
    /// Progress events are emitted every `max(progress_min_stride,
    /// total / progress_divisor)` completions.
    pub progress_min_stride: usize,
    pub progress_divisor: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            small_batch: 3,
            medium_batch: 6,
            large_batch: 10,
            small_threshold: 100,
            large_threshold: 500,
            delay_ms: 100,
            large_delay_ms: 50,
            progress_min_stride: 10,
            progress_divisor: 50,
        }
    }
}

impl SchedulerConfig {
    pub fn batch_size_for(&self, total_jobs: usize) -> usize {
        let size = if total_jobs <= self.small_threshold {
            self.small_batch
        } else if total_jobs <= self.large_threshold {
            self.medium_batch
        } else {
            self.large_batch
        };
        size.max(1)
    }

    pub fn inter_batch_delay_for(&self, total_jobs: usize) -> Duration {
        if total_jobs > self.large_threshold {
            Duration::from_millis(self.large_delay_ms)
        } else {
            Duration::from_millis(self.delay_ms)
        }
    }

    pub fn progress_stride_for(&self, total_jobs: usize) -> usize {
        let divided = total_jobs / self.progress_divisor.max(1);
        self.progress_min_stride.max(divided).max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub full_size: u32,
    pub full_quality: u8,
    pub tiny_size: u32,
    pub tiny_quality: u8,
    /// Prefix for the URLs handed to clients, e.g. `/thumbnails/{key}.jpg`.
    pub url_prefix: String,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            full_size: 300,
            full_quality: 80,
            tiny_size: 64,
            tiny_quality: 60,
            url_prefix: "/thumbnails".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    /// Debounce window for coalescing rapid event bursts.
    pub debounce_window_ms: u64,
    /// Maximum number of changes bundled into a single flush.
    pub max_batch_events: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_window_ms: 250,
            max_batch_events: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffered events per subscriber before it is considered gone.
    pub subscriber_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 1024,
        }
    }
}
