use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, warn};
use vitrine_core::GalleryConfig;

use crate::guard_rails::{ConfigWarnings, apply_guard_rails};

pub const CONFIG_PATH_VAR: &str = "VITRINE_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "VITRINE_CONFIG_JSON";

const CANDIDATES: &[&str] = &[
    "vitrine.toml",
    "vitrine.json",
    "config/vitrine.toml",
    "config/vitrine.json",
];

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("built-in defaults"),
            ConfigSource::EnvPath(path) => write!(f, "${CONFIG_PATH_VAR} ({})", path.display()),
            ConfigSource::EnvInline => write!(f, "${CONFIG_JSON_VAR}"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A validated configuration together with its provenance.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: GalleryConfig,
    pub source: ConfigSource,
    pub warnings: ConfigWarnings,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves a [`GalleryConfig`].
///
/// Evaluation order:
/// 1) `$VITRINE_CONFIG_PATH` (TOML or JSON file),
/// 2) `$VITRINE_CONFIG_JSON` (inline JSON),
/// 3) the first of `vitrine.toml`, `vitrine.json`, `config/vitrine.toml`,
///    `config/vitrine.json` under the base directory,
/// 4) defaults.
pub struct GalleryConfigLoader {
    base_dir: PathBuf,
    env: EnvLookup,
}

impl fmt::Debug for GalleryConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GalleryConfigLoader")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl Default for GalleryConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryConfigLoader {
    /// Loader reading the process environment, searching the current directory.
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Replace the environment lookup, e.g. with a fixed map in tests.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Resolve, parse, and validate.
    pub fn load(&self) -> anyhow::Result<ConfigLoad> {
        let (config, source) = self.resolve()?;
        let warnings = apply_guard_rails(&config)
            .with_context(|| format!("configuration from {source} rejected"))?;
        for warning in warnings.iter() {
            warn!(target: "vitrine::config", hint = ?warning.hint, "{}", warning.message);
        }
        debug!(target: "vitrine::config", %source, "configuration loaded");
        Ok(ConfigLoad {
            config,
            source,
            warnings,
        })
    }

    /// Resolve and parse without validating.
    pub fn resolve(&self) -> anyhow::Result<(GalleryConfig, ConfigSource)> {
        if let Some(path_str) = self.var(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path_str);
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = self.var(CONFIG_JSON_VAR) {
            let parsed = parse_json(&raw).with_context(|| format!("failed to parse {CONFIG_JSON_VAR}"))?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((GalleryConfig::default(), ConfigSource::Default))
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.trim().is_empty())
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| self.base_dir.join(candidate))
            .find(|path| path.is_file())
    }
}

pub fn load_from_file(path: &Path) -> anyhow::Result<GalleryConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read gallery config from {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents).with_context(|| format!("invalid gallery config {}", path.display())),
        Some("toml") | Some("tml") => toml::from_str(&contents)
            .map_err(|err| anyhow!("invalid gallery config {}: {}", path.display(), err)),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

/// Try TOML first, then JSON.
pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<GalleryConfig> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse gallery config {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<GalleryConfig> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid gallery config json: {err}"))
}
