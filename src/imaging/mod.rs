//! Image conversion in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Resize** | Lanczos3, only when wider than `images.max_width` |
//! | **Encode → AVIF** | rav1e via `image::codecs::avif` |
//! | **Encode → WebP** | `image::codecs::webp` (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Converter**: [`ImageConverter`], the cached front door used by the loader

pub mod backend;
mod calculations;
pub mod converter;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use converter::{ConvertError, ImageConverter};
pub use params::{EncodeParams, EncodeSettings, OutputFormat, Quality, Speed};
pub use rust_backend::RustBackend;
