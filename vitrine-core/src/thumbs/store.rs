use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::key::{ThumbnailKey, ThumbnailVariant, parse_artifact_name};
use super::render::{
    FrameExtractor, RenderError, render_decoded, render_image_file, render_placeholder,
};
use crate::config::ThumbnailConfig;
use crate::error::{GenerationError, StoreError};
use crate::media::{MediaDescriptor, MediaKind};

/// Storage seam used by the scheduler and the cache coordinator.
#[async_trait]
pub trait ThumbnailBackend: Send + Sync {
    /// Cheap probe; never generates.
    async fn exists(&self, descriptor: &MediaDescriptor, variant: ThumbnailVariant) -> bool;

    /// Render and persist one variant. A failed call leaves no artifact.
    async fn generate(
        &self,
        descriptor: &MediaDescriptor,
        variant: ThumbnailVariant,
    ) -> Result<(), GenerationError>;

    /// Delete both variants. Missing files are fine.
    async fn remove(&self, descriptor: &MediaDescriptor);

    /// Delete stored thumbnails whose source is gone from `root`. Returns the
    /// number of records (keys) removed.
    async fn cleanup_orphans(&self, root: &Path) -> Result<usize, StoreError>;

    fn url_for(&self, relative_path: &str, variant: ThumbnailVariant) -> String;
}

impl fmt::Debug for dyn ThumbnailBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn ThumbnailBackend")
    }
}

/// Flat directory of `{key}.jpg` / `{key}_tiny.jpg` files.
#[derive(Clone)]
pub struct ThumbnailStore {
    dir: PathBuf,
    settings: ThumbnailConfig,
    extractor: Option<Arc<dyn FrameExtractor>>,
}

impl fmt::Debug for ThumbnailStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailStore")
            .field("dir", &self.dir)
            .field("settings", &self.settings)
            .field("has_extractor", &self.extractor.is_some())
            .finish()
    }
}

impl ThumbnailStore {
    pub fn new(dir: PathBuf, settings: ThumbnailConfig) -> Self {
        Self {
            dir,
            settings,
            extractor: None,
        }
    }

    pub fn with_frame_extractor(mut self, extractor: Arc<dyn FrameExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, relative_path: &str, variant: ThumbnailVariant) -> PathBuf {
        self.dir
            .join(ThumbnailKey::for_relative_path(relative_path).file_name(variant))
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
            StoreError::Internal(format!(
                "failed to create thumbnail dir {:?}: {err}",
                self.dir
            ))
        })
    }

    /// Write via a sibling temp file and rename, so a crash or failed write
    /// never leaves a truncated `.jpg` that `exists` would accept.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_dir().await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .dir
            .join(format!("{file_name}.tmp-{}", Uuid::new_v4().simple()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Internal(format!(
                "failed to write thumbnail {:?}: {err}",
                path
            )));
        }
        Ok(())
    }

    fn render(&self, descriptor: &MediaDescriptor, variant: ThumbnailVariant) -> Result<Vec<u8>, RenderError> {
        match descriptor.kind {
            MediaKind::Image => {
                render_image_file(&descriptor.absolute_path, variant, &self.settings)
            }
            MediaKind::Video => {
                if let Some(extractor) = &self.extractor {
                    match extractor.extract_frame(&descriptor.absolute_path) {
                        Ok(frame) => return render_decoded(frame, variant, &self.settings),
                        Err(err) => warn!(
                            target: "vitrine::cache",
                            relative_path = %descriptor.relative_path,
                            error = %err,
                            "frame extraction failed; using placeholder"
                        ),
                    }
                }
                render_placeholder(variant, &self.settings)
            }
        }
    }

    async fn remove_file(path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!(
                    target: "vitrine::cache",
                    path = %path.display(),
                    error = %err,
                    "failed to remove thumbnail"
                );
                false
            }
        }
    }
}

#[async_trait]
impl ThumbnailBackend for ThumbnailStore {
    async fn exists(&self, descriptor: &MediaDescriptor, variant: ThumbnailVariant) -> bool {
        let path = self.path_for(&descriptor.relative_path, variant);
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn generate(
        &self,
        descriptor: &MediaDescriptor,
        variant: ThumbnailVariant,
    ) -> Result<(), GenerationError> {
        let relative_path = descriptor.relative_path.clone();
        let store = self.clone();
        let owned = descriptor.clone();
        let bytes = tokio::task::spawn_blocking(move || store.render(&owned, variant))
            .await
            .map_err(|err| GenerationError::new(&relative_path, format!("render task failed: {err}")))?
            .map_err(|err| GenerationError::new(&relative_path, err.to_string()))?;

        let path = self.path_for(&relative_path, variant);
        self.write_atomic(&path, &bytes)
            .await
            .map_err(|err| GenerationError::new(&relative_path, err.to_string()))?;

        debug!(
            target: "vitrine::cache",
            relative_path = %relative_path,
            ?variant,
            bytes = bytes.len(),
            "thumbnail written"
        );
        Ok(())
    }

    async fn remove(&self, descriptor: &MediaDescriptor) {
        for variant in [ThumbnailVariant::Full, ThumbnailVariant::Tiny] {
            Self::remove_file(&self.path_for(&descriptor.relative_path, variant)).await;
        }
    }

    async fn cleanup_orphans(&self, root: &Path) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let mut removed_keys: HashSet<ThumbnailKey> = HashSet::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let readings = parse_artifact_name(&name);
            if readings.is_empty() {
                continue;
            }

            let mut decoded = Vec::with_capacity(readings.len());
            for (key, _) in &readings {
                match key.decode().ok().and_then(|rel| source_path(root, &rel)) {
                    Some(source) => decoded.push((key.clone(), source)),
                    None => debug!(
                        target: "vitrine::cache",
                        file = %name,
                        key = %key,
                        "reading does not decode to a source path"
                    ),
                }
            }

            let Some((owner, _)) = decoded.first().cloned() else {
                warn!(
                    target: "vitrine::cache",
                    file = %name,
                    "skipping thumbnail with undecodable key"
                );
                continue;
            };

            let mut source_present = false;
            for (_, source) in &decoded {
                if tokio::fs::try_exists(source).await.unwrap_or(false) {
                    source_present = true;
                    break;
                }
            }
            if source_present {
                continue;
            }

            if Self::remove_file(&entry.path()).await {
                removed_keys.insert(owner);
            }
        }

        if !removed_keys.is_empty() {
            info!(
                target: "vitrine::cache",
                root = %root.display(),
                removed = removed_keys.len(),
                "removed orphaned thumbnails"
            );
        }
        Ok(removed_keys.len())
    }

    fn url_for(&self, relative_path: &str, variant: ThumbnailVariant) -> String {
        format!(
            "{}/{}",
            self.settings.url_prefix.trim_end_matches('/'),
            ThumbnailKey::for_relative_path(relative_path).file_name(variant)
        )
    }
}

// Decoded keys must stay below the root.
fn source_path(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() {
        return None;
    }
    let rel = Path::new(relative);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(root.join(rel))
}
