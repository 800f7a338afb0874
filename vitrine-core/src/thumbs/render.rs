//! Pixel work for thumbnails. Everything here is blocking and is expected to
//! run on the blocking pool.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use thiserror::Error;

use super::key::ThumbnailVariant;
use crate::config::ThumbnailConfig;

const PLACEHOLDER_BACKGROUND: Rgb<u8> = Rgb([38, 38, 38]);
const PLACEHOLDER_GLYPH: Rgb<u8> = Rgb([230, 230, 230]);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("frame extraction failed: {0}")]
    Extraction(String),
}

/// Supplies a representative frame for a video file. Failures should be
/// reported as [`RenderError::Extraction`].
pub trait FrameExtractor: Send + Sync {
    fn extract_frame(&self, source: &Path) -> Result<DynamicImage, RenderError>;
}

impl fmt::Debug for dyn FrameExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn FrameExtractor")
    }
}

/// Decode `source` and produce the JPEG bytes for `variant`.
pub fn render_image_file(
    source: &Path,
    variant: ThumbnailVariant,
    settings: &ThumbnailConfig,
) -> Result<Vec<u8>, RenderError> {
    let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    render_decoded(image, variant, settings)
}

/// Resize an already decoded image for `variant` and encode it.
pub fn render_decoded(
    image: DynamicImage,
    variant: ThumbnailVariant,
    settings: &ThumbnailConfig,
) -> Result<Vec<u8>, RenderError> {
    match variant {
        ThumbnailVariant::Full => {
            let size = settings.full_size;
            let fitted = if image.width() > size || image.height() > size {
                image.resize(size, size, FilterType::Lanczos3)
            } else {
                image
            };
            encode_jpeg(&fitted.to_rgb8(), settings.full_quality)
        }
        ThumbnailVariant::Tiny => {
            let size = settings.tiny_size;
            let filled = image.resize_to_fill(size, size, FilterType::Triangle);
            encode_jpeg(&filled.to_rgb8(), settings.tiny_quality)
        }
    }
}

/// Solid square with a centred play glyph. Identical for every video.
pub fn render_placeholder(
    variant: ThumbnailVariant,
    settings: &ThumbnailConfig,
) -> Result<Vec<u8>, RenderError> {
    let (size, quality) = match variant {
        ThumbnailVariant::Full => (settings.full_size, settings.full_quality),
        ThumbnailVariant::Tiny => (settings.tiny_size, settings.tiny_quality),
    };
    encode_jpeg(&placeholder_pixels(size), quality)
}

fn placeholder_pixels(size: u32) -> RgbImage {
    let s = size as f32;
    // Right-pointing triangle, 40% of the edge tall, nudged right so it
    // looks optically centred.
    let half_h = s * 0.2;
    let cx = s * 0.5 + s * 0.03;
    let cy = s * 0.5;
    let a = (cx - half_h * 0.866, cy - half_h);
    let b = (cx - half_h * 0.866, cy + half_h);
    let c = (cx + half_h * 0.866, cy);

    RgbImage::from_fn(size, size, |x, y| {
        let p = (x as f32 + 0.5, y as f32 + 0.5);
        if inside_triangle(p, a, b, c) {
            PLACEHOLDER_GLYPH
        } else {
            PLACEHOLDER_BACKGROUND
        }
    })
}

fn inside_triangle(
    p: (f32, f32),
    a: (f32, f32),
    b: (f32, f32),
    c: (f32, f32),
) -> bool {
    let edge = |p1: (f32, f32), p2: (f32, f32)| {
        (p.0 - p2.0) * (p1.1 - p2.1) - (p1.0 - p2.0) * (p.1 - p2.1)
    };
    let d1 = edge(a, b);
    let d2 = edge(b, c);
    let d3 = edge(c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]), "jpeg magic bytes");
        let decoded = image::load_from_memory(bytes).expect("decode jpeg");
        (decoded.width(), decoded.height())
    }

    #[test]
    fn full_variant_fits_inside_preserving_aspect() {
        let settings = ThumbnailConfig::default();
        let bytes =
            render_decoded(gradient(1200, 600), ThumbnailVariant::Full, &settings)
                .unwrap();
        assert_eq!(dimensions(&bytes), (300, 150));
    }

    #[test]
    fn full_variant_never_upscales() {
        let settings = ThumbnailConfig::default();
        let bytes =
            render_decoded(gradient(120, 80), ThumbnailVariant::Full, &settings)
                .unwrap();
        assert_eq!(dimensions(&bytes), (120, 80));
    }

    #[test]
    fn tiny_variant_is_cover_fit_square() {
        let settings = ThumbnailConfig::default();
        let bytes =
            render_decoded(gradient(640, 200), ThumbnailVariant::Tiny, &settings)
                .unwrap();
        assert_eq!(dimensions(&bytes), (64, 64));
    }

    #[test]
    fn placeholder_is_deterministic() {
        let settings = ThumbnailConfig::default();
        let first = render_placeholder(ThumbnailVariant::Full, &settings).unwrap();
        let second = render_placeholder(ThumbnailVariant::Full, &settings).unwrap();
        assert_eq!(first, second);
        assert_eq!(dimensions(&first), (300, 300));

        let pixels = placeholder_pixels(300);
        assert_eq!(*pixels.get_pixel(150, 150), PLACEHOLDER_GLYPH);
        assert_eq!(*pixels.get_pixel(5, 5), PLACEHOLDER_BACKGROUND);
    }

    #[test]
    fn corrupt_source_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let err = render_image_file(&path, ThumbnailVariant::Full, &ThumbnailConfig::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::Codec(_)), "got {err:?}");
    }
}
