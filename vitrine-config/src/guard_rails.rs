use thiserror::Error;
use vitrine_core::GalleryConfig;
use vitrine_core::config::{SchedulerConfig, ThumbnailConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("scheduler.{field} must be greater than zero")]
    ZeroBatch { field: &'static str },
    #[error(
        "scheduler thresholds must ascend: small_threshold {small} > large_threshold {large}"
    )]
    ThresholdOrder { small: usize, large: usize },
    #[error("thumbnails.tiny_size {tiny} exceeds thumbnails.full_size {full}")]
    TinyLargerThanFull { tiny: u32, full: u32 },
    #[error("thumbnails.{field} must be greater than zero")]
    ZeroDimension { field: &'static str },
    #[error("thumbnails.{field} {value} is outside 1..=100")]
    Quality { field: &'static str, value: u8 },
    #[error("cache.dir_name must be a single non-empty path segment, got {0:?}")]
    CacheDirName(String),
    #[error("events.subscriber_capacity must be greater than zero")]
    ZeroSubscriberCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Reject configurations the scheduler or store cannot honour. Settings that
/// work but are probably unintended come back as warnings.
pub fn apply_guard_rails(config: &GalleryConfig) -> Result<ConfigWarnings, ConfigError> {
    let mut warnings = ConfigWarnings::default();

    check_scheduler(&config.scheduler)?;
    check_thumbnails(&config.thumbnails)?;

    let dir_name = config.cache.dir_name.as_str();
    if dir_name.is_empty() || dir_name.contains(['/', '\\']) || dir_name == "." || dir_name == ".." {
        return Err(ConfigError::CacheDirName(dir_name.to_string()));
    }

    if config.events.subscriber_capacity == 0 {
        return Err(ConfigError::ZeroSubscriberCapacity);
    }

    if config.cache.freshness_window_ms == 0 {
        warnings.push_with_hint(
            "cache.freshness_window_ms is 0; every snapshot request rescans the root",
            "Use a window of a few seconds unless the root changes constantly",
        );
    }

    let s = &config.scheduler;
    if s.small_batch > s.medium_batch || s.medium_batch > s.large_batch {
        warnings.push(format!(
            "batch sizes shrink as runs grow ({} / {} / {})",
            s.small_batch, s.medium_batch, s.large_batch
        ));
    }

    if config.watch.enabled && config.watch.debounce_window_ms == 0 {
        warnings.push_with_hint(
            "watch.debounce_window_ms is 0; each filesystem event invalidates the snapshot",
            "A window around 250ms coalesces bulk copies into one rescan",
        );
    }

    Ok(warnings)
}

fn check_scheduler(s: &SchedulerConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("small_batch", s.small_batch),
        ("medium_batch", s.medium_batch),
        ("large_batch", s.large_batch),
    ] {
        if value == 0 {
            return Err(ConfigError::ZeroBatch { field });
        }
    }
    if s.small_threshold > s.large_threshold {
        return Err(ConfigError::ThresholdOrder {
            small: s.small_threshold,
            large: s.large_threshold,
        });
    }
    Ok(())
}

fn check_thumbnails(t: &ThumbnailConfig) -> Result<(), ConfigError> {
    if t.full_size == 0 {
        return Err(ConfigError::ZeroDimension { field: "full_size" });
    }
    if t.tiny_size == 0 {
        return Err(ConfigError::ZeroDimension { field: "tiny_size" });
    }
    if t.tiny_size > t.full_size {
        return Err(ConfigError::TinyLargerThanFull {
            tiny: t.tiny_size,
            full: t.full_size,
        });
    }
    for (field, value) in [
        ("full_quality", t.full_quality),
        ("tiny_quality", t.tiny_quality),
    ] {
        if !(1..=100).contains(&value) {
            return Err(ConfigError::Quality { field, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_without_warnings() {
        let warnings = apply_guard_rails(&GalleryConfig::default()).unwrap();
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn zero_batch_is_rejected() {
        let mut config = GalleryConfig::default();
        config.scheduler.medium_batch = 0;
        assert_eq!(
            apply_guard_rails(&config).unwrap_err(),
            ConfigError::ZeroBatch {
                field: "medium_batch"
            }
        );
    }

    #[test]
    fn descending_thresholds_are_rejected() {
        let mut config = GalleryConfig::default();
        config.scheduler.small_threshold = 600;
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigError::ThresholdOrder {
                small: 600,
                large: 500
            })
        ));
    }

    #[test]
    fn tiny_variant_cannot_outgrow_full() {
        let mut config = GalleryConfig::default();
        config.thumbnails.tiny_size = 512;
        assert_eq!(
            apply_guard_rails(&config).unwrap_err(),
            ConfigError::TinyLargerThanFull {
                tiny: 512,
                full: 300
            }
        );
    }

    #[test]
    fn quality_bounds() {
        let mut config = GalleryConfig::default();
        config.thumbnails.tiny_quality = 0;
        assert_eq!(
            apply_guard_rails(&config).unwrap_err(),
            ConfigError::Quality {
                field: "tiny_quality",
                value: 0
            }
        );
        config.thumbnails.tiny_quality = 100;
        config.thumbnails.full_quality = 101;
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigError::Quality {
                field: "full_quality",
                ..
            })
        ));
    }

    #[test]
    fn cache_dir_name_must_be_one_segment() {
        let mut config = GalleryConfig::default();
        config.cache.dir_name = "a/b".into();
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigError::CacheDirName(_))
        ));
    }

    #[test]
    fn odd_but_workable_settings_warn() {
        let mut config = GalleryConfig::default();
        config.cache.freshness_window_ms = 0;
        config.scheduler.large_batch = 2;
        let warnings = apply_guard_rails(&config).unwrap();
        assert_eq!(warnings.items.len(), 2);
        assert!(warnings.items[0].hint.is_some());
        assert!(warnings.items[1].message.contains("3 / 6 / 2"));
    }
}
