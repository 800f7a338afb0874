//! # Vitrine Core
//!
//! Media scanning and thumbnail caching for a single gallery root.
//!
//! ## Overview
//!
//! - **Classification**: image/video detection by extension, and recognition
//!   of generated artifacts so they are never scanned as sources
//! - **Scanning**: depth-first walk that skips hidden, dependency, and cache
//!   directories and tolerates unreadable subtrees
//! - **Thumbnails**: reversible path keys, full and tiny JPEG variants, atomic
//!   writes, orphan cleanup
//! - **Scheduling**: viewport-first batched generation with pause/resume and
//!   throttled progress reporting
//! - **Caching**: a freshness-windowed snapshot, rebuilt single-flight and
//!   invalidated by filesystem watching
//! - **Progress**: fan-out of [`ProgressEvent`]s to any number of subscribers
//!
//! ## Feature Flags
//!
//! - `watch` (default): `notify`-backed filesystem watching
//!
//! ## Examples
//!
//! ```no_run
//! use vitrine_core::{GalleryConfig, GalleryService};
//!
//! # async fn demo() {
//! let service = GalleryService::new("/srv/photos", GalleryConfig::default());
//! let mut progress = service.subscribe_progress();
//! let snapshot = service.get_snapshot().await;
//! println!("{} items", snapshot.total_count);
//! while let Some(event) = progress.recv().await {
//!     println!("{}", serde_json::to_string(&event).unwrap());
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod media;
pub mod orchestration;
pub mod scan;
pub mod service;
pub mod thumbs;

pub use cache::{GallerySnapshot, SnapshotEntry};
pub use config::GalleryConfig;
pub use error::{GalleryError, Result};
pub use media::{MediaDescriptor, MediaKind, classify, looks_like_generated_artifact};
pub use orchestration::{ProgressEvent, ProgressSubscription, SchedulerPhase, SchedulerStatus};
pub use service::GalleryService;
pub use thumbs::{ThumbnailKey, ThumbnailVariant};
