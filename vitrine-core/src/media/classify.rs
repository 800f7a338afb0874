use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::scan::scanner::settings::{
    DEFAULT_CACHE_DIR_NAME, DEFAULT_IMAGE_FILE_EXTENSIONS,
    DEFAULT_VIDEO_FILE_EXTENSIONS, THUMBNAIL_DIR_NAMES,
};
use crate::thumbs::key::parse_artifact_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Classify a file name by extension. Matching is case-insensitive.
pub fn classify(file_name: &str) -> Option<MediaKind> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    if DEFAULT_IMAGE_FILE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if DEFAULT_VIDEO_FILE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Recognises files this system (or a similar tool) generated, so they are
/// never rescanned as source media.
#[derive(Clone, Debug)]
pub struct ArtifactFilter {
    cache_dir_name: String,
}

impl Default for ArtifactFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DIR_NAME)
    }
}

impl ArtifactFilter {
    pub fn new(cache_dir_name: impl Into<String>) -> Self {
        Self {
            cache_dir_name: cache_dir_name.into(),
        }
    }

    pub fn cache_dir_name(&self) -> &str {
        &self.cache_dir_name
    }

    /// True when `path` sits inside the cache directory or a conventional
    /// thumbnail directory, or `file_name` follows the thumbnail key naming.
    ///
    /// Pass `path` relative to the scan root; a root that itself lives under
    /// a directory named `thumbs` must not hide the whole library.
    pub fn matches(&self, path: &Path, file_name: &str) -> bool {
        for component in path.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let segment = segment.to_string_lossy();
            if segment == self.cache_dir_name.as_str() {
                return true;
            }
            if THUMBNAIL_DIR_NAMES
                .iter()
                .any(|name| segment.eq_ignore_ascii_case(name))
            {
                return true;
            }
        }
        matches_key_naming(file_name)
    }
}

/// [`ArtifactFilter::matches`] with the default cache directory name.
pub fn looks_like_generated_artifact(path: &Path, file_name: &str) -> bool {
    ArtifactFilter::default().matches(path, file_name)
}

// A name matches when one of its readings decodes to a media path. Plain
// camera names ("IMG_1234.jpg") either fail to decode or decode to bytes
// without a media extension.
fn matches_key_naming(file_name: &str) -> bool {
    parse_artifact_name(file_name).iter().any(|(key, _)| {
        key.decode().is_ok_and(|decoded| {
            let leaf = decoded.rsplit('/').next().unwrap_or(&decoded);
            classify(leaf).is_some()
        })
    })
}
