//! Pure Rust image encoding backend, no system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless, pure Rust) |

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_to_width;
use super::params::{EncodeParams, OutputFormat, Quality, Speed};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Normalize to 8-bit RGB(A); both encoders reject 16-bit and float buffers.
fn to_8bit(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode as AVIF using rav1e.
fn encode_avif(img: &DynamicImage, quality: Quality, speed: Speed) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut out,
        speed.value(),
        quality.value() as u8,
    );
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))?;
    Ok(out)
}

/// Encode as WebP. The pure-Rust encoder only supports lossless output.
fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {}", e)))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn encode(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let img = match fit_to_width((img.width(), img.height()), params.settings.max_width) {
            Some((w, h)) => img.resize(w, h, FilterType::Lanczos3),
            None => img,
        };
        let img = to_8bit(img);

        match params.format {
            OutputFormat::Avif => encode_avif(&img, params.settings.quality, params.settings.speed),
            OutputFormat::Webp => encode_webp(&img),
        }
    }
}
