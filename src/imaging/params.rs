//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the [`converter`](super::converter) (which decides what
//! to encode and caches the result) and the [`backend`](super::backend)
//! (which does the pixel work), so a mock backend can stand in for tests.

use std::fmt;
use std::path::PathBuf;

/// Target encodings produced by conversion.
///
/// The third, universally supported variant of every image is a raw copy of
/// the source file and never goes through a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Avif,
    Webp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Avif, OutputFormat::Webp];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Avif => "image/avif",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// rav1e speed preset (1 = slowest/best, 10 = fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed(pub u8);

impl Speed {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 10))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(6)
    }
}

/// Encoding settings shared by every conversion of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeSettings {
    pub quality: Quality,
    pub speed: Speed,
    /// Downscale wider images to this width; `0` keeps the original size.
    pub max_width: u32,
}

/// Parameters for one encode operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub settings: EncodeSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn speed_clamps_to_valid_range() {
        assert_eq!(Speed::new(0).value(), 1);
        assert_eq!(Speed::new(11).value(), 10);
        assert_eq!(Speed::default().value(), 6);
    }

    #[test]
    fn formats_map_to_extensions_and_mime_types() {
        assert_eq!(OutputFormat::Avif.extension(), "avif");
        assert_eq!(OutputFormat::Webp.to_string(), "webp");
        assert_eq!(OutputFormat::Avif.mime_type(), "image/avif");
    }
}
