//! Configuration loading for vitrine.
//!
//! [`GalleryConfigLoader`] finds a [`GalleryConfig`] in the environment or on
//! disk and reports where it came from; [`apply_guard_rails`] rejects settings
//! the core cannot run with and collects warnings for ones that merely look
//! wrong.

pub mod guard_rails;
pub mod loader;

pub use guard_rails::{ConfigError, ConfigWarning, ConfigWarnings, apply_guard_rails};
pub use loader::{ConfigLoad, ConfigSource, GalleryConfigLoader};
pub use vitrine_core::GalleryConfig;
