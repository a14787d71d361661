//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the downscaled dimensions for an image wider than `max_width`.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `max_width` - Widest allowed output; `0` disables resizing
///
/// # Returns
/// * `None` if the image already fits (never upscale)
/// * `Some((width, height))` preserving aspect ratio otherwise
pub fn fit_to_width(source: (u32, u32), max_width: u32) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if max_width == 0 || src_w <= max_width {
        return None;
    }
    let h = (src_h as f64 * max_width as f64 / src_w as f64).round() as u32;
    Some((max_width, h.max(1)))
}
