use std::path::PathBuf;

use thiserror::Error;

/// A directory or file could not be read during a scan. The affected subtree
/// contributes no descriptors; the rest of the scan continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("scan failed at {}: {message}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

impl ScanError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Thumbnail generation failed for one source file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("thumbnail generation failed for {relative_path}: {message}")]
pub struct GenerationError {
    pub relative_path: String,
    pub message: String,
}

impl GenerationError {
    pub fn new(
        relative_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            message: message.into(),
        }
    }
}

/// A stored thumbnail key could not be turned back into a relative path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed thumbnail key {key:?}: {message}")]
pub struct DecodeError {
    pub key: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("watch error: {0}")]
    Watch(String),
}

impl From<std::io::Error> for GalleryError {
    fn from(err: std::io::Error) -> Self {
        GalleryError::Store(StoreError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
