//! Media classification and descriptors.

pub mod classify;
pub mod descriptor;

pub use classify::{
    ArtifactFilter, MediaKind, classify, looks_like_generated_artifact,
};
pub use descriptor::{MediaDescriptor, ROOT_DIRECTORY, directory_of};
