use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classify::MediaKind;

/// Directory label used for files sitting directly under the scan root.
pub const ROOT_DIRECTORY: &str = ".";

/// One discovered media file. Identity is `relative_path`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub name: String,
    pub absolute_path: PathBuf,
    /// `/`-separated path relative to the scan root.
    pub relative_path: String,
    /// Parent of `relative_path`, or [`ROOT_DIRECTORY`].
    pub directory: String,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub kind: MediaKind,
}

impl MediaDescriptor {
    /// Build a descriptor for `absolute_path` found under `root`.
    ///
    /// Returns `None` when the path is not below `root`.
    pub fn from_parts(
        root: &Path,
        absolute_path: &Path,
        kind: MediaKind,
        size_bytes: u64,
        modified_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let relative_path = relative_path_string(root, absolute_path)?;
        let name = absolute_path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            name,
            absolute_path: absolute_path.to_path_buf(),
            directory: directory_of(&relative_path).to_string(),
            relative_path,
            size_bytes,
            modified_at,
            kind,
        })
    }
}

/// `/`-joined representation of `path` relative to `root`.
pub fn relative_path_string(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(seg) => parts.push(seg.to_string_lossy()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Parent directory of a relative path, `.` for root-level files.
pub fn directory_of(relative_path: &str) -> &str {
    match relative_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ROOT_DIRECTORY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_paths_are_relative_and_grouped() {
        let root = Path::new("/library");
        let desc = MediaDescriptor::from_parts(
            root,
            Path::new("/library/trips/2024/beach.jpg"),
            MediaKind::Image,
            42,
            None,
        )
        .unwrap();
        assert_eq!(desc.relative_path, "trips/2024/beach.jpg");
        assert_eq!(desc.directory, "trips/2024");
        assert_eq!(desc.name, "beach.jpg");

        let top = MediaDescriptor::from_parts(
            root,
            Path::new("/library/cover.png"),
            MediaKind::Image,
            1,
            None,
        )
        .unwrap();
        assert_eq!(top.directory, ROOT_DIRECTORY);
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        assert!(
            relative_path_string(Path::new("/a"), Path::new("/b/c.jpg"))
                .is_none()
        );
        assert!(relative_path_string(Path::new("/a"), Path::new("/a")).is_none());
    }
}
