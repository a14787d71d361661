//! Cached image conversion.
//!
//! [`ImageConverter::convert`] is the only way the rest of the pipeline turns
//! a source image into a modern format. It consults the injected
//! [`ImageCache`] first and only falls through to the [`ImageBackend`] on a
//! miss; the encoded bytes are written through to the cache before they are
//! returned.

use super::backend::{BackendError, ImageBackend};
use super::params::{EncodeParams, EncodeSettings, OutputFormat};
use crate::cache::{CacheKey, CacheStats, ImageCache};
use crate::types::Bytes;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{format} conversion of {source_path} failed: {error}")]
    Backend {
        source_path: String,
        format: OutputFormat,
        #[source]
        error: BackendError,
    },
    #[error("image cache error: {0}")]
    Cache(#[from] std::io::Error),
}

pub struct ImageConverter {
    backend: Arc<dyn ImageBackend>,
    cache: Arc<dyn ImageCache>,
    settings: EncodeSettings,
    stats: Mutex<CacheStats>,
}

impl ImageConverter {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        cache: Arc<dyn ImageCache>,
        settings: EncodeSettings,
    ) -> Self {
        Self {
            backend,
            cache,
            settings,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Convert `source` to `format`, reusing a cached result when one exists
    /// for the same file stem and format.
    ///
    /// Two concurrent first requests for the same key both encode and both
    /// write; the cache's atomic rename keeps the file consistent.
    pub fn convert(&self, source: &Path, format: OutputFormat) -> Result<Bytes, ConvertError> {
        let key = CacheKey::new(source, format);
        if let Some(bytes) = self.cache.get(&key)? {
            self.stats.lock().unwrap_or_else(PoisonError::into_inner).hit();
            return Ok(bytes);
        }

        let params = EncodeParams {
            source: source.to_path_buf(),
            format,
            settings: self.settings,
        };
        let encoded: Bytes = self
            .backend
            .encode(&params)
            .map_err(|error| ConvertError::Backend {
                source_path: source.display().to_string(),
                format,
                error,
            })?
            .into();
        self.cache.put(&key, encoded.clone())?;
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).miss();
        Ok(encoded)
    }

    /// Hit/miss counters accumulated since construction.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use crate::imaging::backend::tests::MockBackend;
    use std::fs;
    use tempfile::TempDir;

    fn converter(cache_dir: &Path, backend: Arc<MockBackend>) -> ImageConverter {
        ImageConverter::new(
            backend,
            Arc::new(DiskCache::open(cache_dir).unwrap()),
            EncodeSettings::default(),
        )
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        let conv = converter(tmp.path(), backend.clone());
        let source = Path::new("/posts/a/cover.png");

        for format in OutputFormat::ALL {
            let first = conv.convert(source, format).unwrap();
            let second = conv.convert(source, format).unwrap();
            assert_eq!(first, second);
        }

        assert_eq!(backend.encode_count(), 2);
        assert_eq!(conv.stats(), CacheStats { hits: 2, misses: 2 });
    }

    #[test]
    fn miss_writes_through_to_cache_dir() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(tmp.path(), Arc::new(MockBackend::new()));

        conv.convert(Path::new("/posts/a/cover.png"), OutputFormat::Webp)
            .unwrap();

        assert_eq!(
            fs::read(tmp.path().join("cover.webp")).unwrap(),
            MockBackend::expected_bytes("/posts/a/cover.png", OutputFormat::Webp)
        );
    }

    #[test]
    fn preexisting_cache_file_skips_encoder() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cover.avif"), b"from last build").unwrap();
        let backend = Arc::new(MockBackend::new());
        let conv = converter(tmp.path(), backend.clone());

        let bytes = conv
            .convert(Path::new("/elsewhere/cover.jpg"), OutputFormat::Avif)
            .unwrap();

        assert_eq!(&*bytes, b"from last build");
        assert_eq!(backend.encode_count(), 0);
    }

    #[test]
    fn backend_failure_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::failing("corrupt"));
        let conv = converter(tmp.path(), backend.clone());

        let err = conv
            .convert(Path::new("bad.png"), OutputFormat::Avif)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Backend { format: OutputFormat::Avif, .. }));
        assert!(!tmp.path().join("bad.avif").exists());
        assert_eq!(conv.stats().total(), 0);
    }
}
