//! Shared types used across the pipeline, the plugin protocol and the host.
//!
//! Identifiers are newtypes rather than bare strings so an asset handle can
//! never be confused with a module identifier at a call site.

use std::fmt;
use std::sync::Arc;

/// Immutable, cheaply clonable byte buffer (image variants, raw copies).
pub type Bytes = Arc<[u8]>;

/// Opaque handle for a file emitted to the host (asset or chunk).
///
/// Handed out before the file's content is known, so it can be embedded in
/// generated source text as a forward reference. Renders as eight hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u32);

impl AssetId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Parse the eight-hex-digit form produced by `Display`.
    pub fn parse(token: &str) -> Option<Self> {
        if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(token, 16).ok().map(Self)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Identifier of a module the pipeline serves to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

/// Well-known identifier of the aggregate metadata module.
///
/// The leading NUL marks it as virtual: no file on disk can ever have it.
pub const META_MODULE_ID: &str = "\0mdbuild:meta";

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn meta() -> Self {
        Self(META_MODULE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace('\0', "\\0"))
    }
}

/// The three emitted variants of one source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAssetIds {
    pub avif: AssetId,
    pub webp: AssetId,
    /// Raw copy of the source file, for browsers without modern formats.
    pub baseline: AssetId,
}

/// Metadata record for one post, as serialized into the metadata module.
#[derive(Debug, Clone, PartialEq)]
pub struct PostMetadata {
    pub title: String,
    pub category: String,
    pub author: String,
    pub summary: String,
    /// Date segment of the post directory name.
    pub date: String,
    /// `"/" + slug`
    pub url: String,
    pub cover_images: ImageAssetIds,
    /// Chunk reference of the post's HTML module.
    pub content_module_ref: AssetId,
}
