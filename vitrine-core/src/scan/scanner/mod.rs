//! Depth-first media discovery over a [`FileSystem`].

pub mod fs;
pub mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::media::{ArtifactFilter, MediaDescriptor, classify};

pub use fs::{FileSystem, FsMetadata, InMemoryFs, ReadDirStream, RealFs};
use settings::{DEPENDENCY_DIR_NAME, HIDDEN_MARKER, SCAN_PROGRESS_EVERY};

/// Counters reported while a scan is walking the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub directories_visited: usize,
    pub files_found: usize,
}

/// Side channel for scan progress. Not required for correctness.
pub trait ScanObserver: Send + Sync {
    fn on_progress(&self, progress: ScanProgress);
}

/// Observer used when nobody listens to scan progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScanObserver;

impl ScanObserver for NoopScanObserver {
    fn on_progress(&self, _progress: ScanProgress) {}
}

/// Result of one walk: everything that could be read, plus what could not.
#[derive(Debug, Default, Clone)]
pub struct ScanOutcome {
    pub descriptors: Vec<MediaDescriptor>,
    pub errors: Vec<ScanError>,
    pub directories_visited: usize,
}

/// Walks a root and produces media descriptors.
///
/// Each call to [`DirectoryScanner::scan`] is an independent walk, so a scan
/// can be restarted simply by calling it again.
#[derive(Clone)]
pub struct DirectoryScanner {
    fs: Arc<dyn FileSystem>,
    filter: ArtifactFilter,
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("fs", &"dyn FileSystem")
            .field("filter", &self.filter)
            .finish()
    }
}

impl DirectoryScanner {
    pub fn new(fs: Arc<dyn FileSystem>, filter: ArtifactFilter) -> Self {
        Self { fs, filter }
    }

    fn is_excluded_name(&self, name: &str) -> bool {
        name.starts_with(HIDDEN_MARKER)
            || name == DEPENDENCY_DIR_NAME
            || name == self.filter.cache_dir_name()
    }

    pub async fn scan(
        &self,
        root: &Path,
        observer: &dyn ScanObserver,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut progress = ScanProgress::default();
        let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = match self.list_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        target: "vitrine::scan",
                        path = %dir.display(),
                        error = %err.message,
                        "skipping unreadable directory"
                    );
                    outcome.errors.push(err);
                    continue;
                }
            };
            progress.directories_visited += 1;

            let mut subdirs = Vec::new();
            for path in entries {
                let Some(name) = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                if self.is_excluded_name(&name) {
                    continue;
                }

                let meta = match self.fs.metadata(&path).await {
                    Ok(meta) => meta,
                    Err(err) => {
                        let err = ScanError::new(&path, err.to_string());
                        warn!(
                            target: "vitrine::scan",
                            path = %path.display(),
                            error = %err.message,
                            "skipping unreadable entry"
                        );
                        outcome.errors.push(err);
                        continue;
                    }
                };

                if meta.is_symlink {
                    debug!(target: "vitrine::scan", path = %path.display(), "not following symlink");
                    continue;
                }
                if meta.is_dir {
                    subdirs.push(path);
                    continue;
                }
                if !meta.is_file {
                    continue;
                }

                let Some(kind) = classify(&name) else {
                    continue;
                };
                let relative = path.strip_prefix(root).unwrap_or(&path);
                if self.filter.matches(relative, &name) {
                    continue;
                }

                let modified_at = meta.modified.map(DateTime::<Utc>::from);
                if let Some(descriptor) = MediaDescriptor::from_parts(
                    root,
                    &path,
                    kind,
                    meta.len,
                    modified_at,
                ) {
                    outcome.descriptors.push(descriptor);
                    progress.files_found += 1;
                    if progress.files_found % SCAN_PROGRESS_EVERY == 0 {
                        observer.on_progress(progress);
                    }
                }
            }

            // Reverse so the lexically first subdirectory is walked first.
            stack.extend(subdirs.into_iter().rev());
        }

        outcome.directories_visited = progress.directories_visited;
        observer.on_progress(progress);
        debug!(
            target: "vitrine::scan",
            root = %root.display(),
            files = outcome.descriptors.len(),
            directories = outcome.directories_visited,
            errors = outcome.errors.len(),
            "scan finished"
        );
        outcome
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let mut stream = self
            .fs
            .read_dir(dir)
            .await
            .map_err(|err| ScanError::new(dir, err.to_string()))?;
        let mut entries = Vec::new();
        while let Some(path) = stream
            .next_entry()
            .await
            .map_err(|err| ScanError::new(dir, err.to_string()))?
        {
            entries.push(path);
        }
        entries.sort();
        Ok(entries)
    }
}
