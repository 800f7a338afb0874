//! Snapshot caching and invalidation.

pub mod coordinator;
pub mod snapshot;

pub use coordinator::{CacheCoordinator, InvalidationSink};
pub use snapshot::{GallerySnapshot, SnapshotCache, SnapshotEntry};
