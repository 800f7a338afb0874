use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Extension shared by every stored artifact.
pub const ARTIFACT_EXTENSION: &str = "jpg";

const TINY_SUFFIX: &str = "_tiny";

/// The two stored resolutions of a thumbnail.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ThumbnailVariant {
    /// Fits within the configured full size, never upscaled.
    Full,
    /// Cover-fit square preview shown while the full variant is pending.
    Tiny,
}

impl ThumbnailVariant {
    fn suffix(self) -> &'static str {
        match self {
            ThumbnailVariant::Full => "",
            ThumbnailVariant::Tiny => TINY_SUFFIX,
        }
    }
}

/// Reversible, filesystem-safe encoding of a relative media path.
///
/// The encoding is unpadded URL-safe base64 over the UTF-8 bytes, so it never
/// contains path separators and round-trips arbitrary Unicode exactly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThumbnailKey(String);

impl ThumbnailKey {
    pub fn for_relative_path(relative_path: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(relative_path.as_bytes()))
    }

    /// Wrap an already-encoded key (e.g. one read back from disk).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<String, DecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(self.0.as_bytes()).map_err(|err| {
            DecodeError {
                key: self.0.clone(),
                message: err.to_string(),
            }
        })?;
        String::from_utf8(bytes).map_err(|err| DecodeError {
            key: self.0.clone(),
            message: format!("decoded key is not UTF-8: {err}"),
        })
    }

    /// `{key}.jpg` for the full variant, `{key}_tiny.jpg` for the tiny one.
    pub fn file_name(&self, variant: ThumbnailVariant) -> String {
        format!("{}{}.{}", self.0, variant.suffix(), ARTIFACT_EXTENSION)
    }
}

impl fmt::Debug for ThumbnailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThumbnailKey").field(&self.0).finish()
    }
}

impl fmt::Display for ThumbnailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Possible readings of an artifact file name, most specific first.
///
/// `abc_tiny.jpg` is ambiguous: it is either the tiny variant of key `abc` or
/// the full variant of key `abc_tiny` (`_` is part of the base64 alphabet).
/// Both readings are returned so callers can resolve the ambiguity against
/// the source tree. Names that are not `.jpg` artifacts yield nothing.
pub fn parse_artifact_name(name: &str) -> Vec<(ThumbnailKey, ThumbnailVariant)> {
    let Some(stem) = name
        .strip_suffix(ARTIFACT_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return Vec::new();
    };

    let mut readings = Vec::with_capacity(2);
    if let Some(short) = stem.strip_suffix(TINY_SUFFIX)
        && !short.is_empty()
    {
        readings.push((
            ThumbnailKey::from_encoded(short),
            ThumbnailVariant::Tiny,
        ));
    }
    readings.push((ThumbnailKey::from_encoded(stem), ThumbnailVariant::Full));
    readings
}
