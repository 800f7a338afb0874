//! Thumbnail keys, rendering, and the on-disk store.

pub mod key;
pub mod render;
pub mod store;

pub use key::{ThumbnailKey, ThumbnailVariant, parse_artifact_name};
pub use render::{FrameExtractor, RenderError};
pub use store::{ThumbnailBackend, ThumbnailStore};
