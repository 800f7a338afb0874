/// Shared scanner defaults.
///
/// Keeping the extension lists in one place lets the classifier, the scanner,
/// and the filesystem watcher agree on what counts as media.
pub const DEFAULT_IMAGE_FILE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"];

pub const DEFAULT_VIDEO_FILE_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "ogg", "m4v", "3gp", "wmv", "flv",
];

/// Name of the directory holding generated artifacts under a scan root.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".vitrine-cache";

/// Package-manager dependency trees are never media libraries.
pub const DEPENDENCY_DIR_NAME: &str = "node_modules";

/// Entries starting with this marker are hidden and skipped.
pub const HIDDEN_MARKER: char = '.';

/// Directory names conventionally used by other tools for thumbnails.
pub const THUMBNAIL_DIR_NAMES: &[&str] =
    &["thumbnails", "thumb", "thumbs", ".thumbnails"];

/// Emit a scan progress tick every this many discovered files.
pub const SCAN_PROGRESS_EVERY: usize = 10;
