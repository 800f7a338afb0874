use serde::{Deserialize, Serialize};

/// State-change notification fanned out to progress subscribers.
///
/// Serialises as `{"type": "thumbnailReady", "relativePath": ..., ...}` so an
/// external transport can forward events verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    TinyPreviewReady {
        relative_path: String,
        url: String,
    },
    ThumbnailReady {
        relative_path: String,
        url: String,
    },
    GlobalProgress {
        total: usize,
        completed: usize,
        current_file: Option<String>,
        /// Whole percent, 0..=100.
        progress: u8,
        is_generating: bool,
    },
    Paused {
        is_paused: bool,
    },
    CacheInvalidated {
        reason: String,
    },
    ScanProgress {
        directories_visited: usize,
        files_found: usize,
    },
    /// Terminal report for one generation run; `total == succeeded + failed`.
    GenerationFinished {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::TinyPreviewReady { .. } => "tinyPreviewReady",
            ProgressEvent::ThumbnailReady { .. } => "thumbnailReady",
            ProgressEvent::GlobalProgress { .. } => "globalProgress",
            ProgressEvent::Paused { .. } => "paused",
            ProgressEvent::CacheInvalidated { .. } => "cacheInvalidated",
            ProgressEvent::ScanProgress { .. } => "scanProgress",
            ProgressEvent::GenerationFinished { .. } => "generationFinished",
        }
    }
}

/// Integer percentage, rounded down, with an empty run counting as done.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) * 100) / total) as u8
}
