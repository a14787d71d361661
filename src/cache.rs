//! Image conversion cache.
//!
//! AVIF encoding is the bottleneck of a build: rav1e can take seconds per
//! image. This module lets the converter skip encoding when a variant was
//! produced by an earlier build.
//!
//! # Design
//!
//! ## Cache keys
//!
//! A key is the source file stem plus the target format:
//! `photos/cover.png` → `cover.avif`, `cover.webp`. Nothing else goes into
//! the key. In particular there is **no content hash and no mtime check**:
//! replacing `cover.png` with a different image of the same name keeps
//! serving the stale conversion until the cache directory is cleared
//! (`mdbuild clean`). Two posts with a `cover.png` each share one entry.
//!
//! ## Storage
//!
//! Each entry is a plain file `<cache_dir>/<key>`. At build start,
//! [`DiskCache::open`] registers every existing file as an on-disk entry; the
//! bytes are read the first time the entry is requested and kept in memory
//! for the rest of the process. Writes go to a temporary file in the same
//! directory and are renamed into place, so a killed build never leaves a
//! truncated entry that a later build would trust.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` starts from [`DiskCache::empty`]: nothing is preloaded, every
//! image is re-encoded, and the fresh results overwrite the old files.

use crate::imaging::OutputFormat;
use crate::types::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::Builder;

/// Prefix of in-flight writes. Files with it are never cache entries.
const TEMP_PREFIX: &str = ".tmp";

/// Key of one cached conversion: `<stem>.<format>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(source: &Path, format: OutputFormat) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(format!("{}.{}", stem, format.extension()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache service the converter is built on.
pub trait ImageCache: Send + Sync {
    /// Cached bytes for `key`, if any.
    fn get(&self, key: &CacheKey) -> io::Result<Option<Bytes>>;

    /// Store bytes for `key`, replacing any previous entry.
    fn put(&self, key: &CacheKey, bytes: Bytes) -> io::Result<()>;
}

enum Slot {
    /// Found on disk at startup, not read yet.
    OnDisk(PathBuf),
    Loaded(Bytes),
}

/// Write-through cache backed by a directory of plain files.
pub struct DiskCache {
    dir: PathBuf,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl DiskCache {
    /// Open the cache directory, creating it if needed, and register every
    /// file already in it.
    pub fn open(dir: &Path) -> io::Result<Self> {
        let cache = Self::empty(dir)?;
        {
            let mut entries = cache.lock();
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                // Temp files of an interrupted write
                if name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                entries.insert(CacheKey(name), Slot::OnDisk(entry.path()));
            }
        }
        Ok(cache)
    }

    /// Create the cache directory if needed, but ignore its contents.
    pub fn empty(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of known entries, loaded or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageCache for DiskCache {
    fn get(&self, key: &CacheKey) -> io::Result<Option<Bytes>> {
        let path = match self.lock().get(key) {
            None => return Ok(None),
            Some(Slot::Loaded(bytes)) => return Ok(Some(bytes.clone())),
            Some(Slot::OnDisk(path)) => path.clone(),
        };
        // Read outside the lock; a concurrent reader of the same key just
        // reads the same file twice.
        let bytes: Bytes = std::fs::read(&path)?.into();
        self.lock().insert(key.clone(), Slot::Loaded(bytes.clone()));
        Ok(Some(bytes))
    }

    fn put(&self, key: &CacheKey, bytes: Bytes) -> io::Result<()> {
        let mut tmp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(self.dir.join(key.as_str()))
            .map_err(|e| e.error)?;
        self.lock().insert(key.clone(), Slot::Loaded(bytes));
        Ok(())
    }
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // CacheKey
    // =========================================================================

    #[test]
    fn key_is_stem_plus_format() {
        let key = CacheKey::new(Path::new("/posts/2021--a/cover.png"), OutputFormat::Avif);
        assert_eq!(key.as_str(), "cover.avif");
        let key = CacheKey::new(Path::new("photo.final.jpg"), OutputFormat::Webp);
        assert_eq!(key.as_str(), "photo.final.webp");
    }

    #[test]
    fn same_stem_in_different_dirs_shares_key() {
        assert_eq!(
            CacheKey::new(Path::new("a/cover.png"), OutputFormat::Avif),
            CacheKey::new(Path::new("b/cover.jpg"), OutputFormat::Avif)
        );
    }

    // =========================================================================
    // DiskCache
    // =========================================================================

    #[test]
    fn empty_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".cache");
        let cache = DiskCache::empty(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_returns_none() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let key = CacheKey::new(Path::new("x.png"), OutputFormat::Avif);
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn put_writes_through_to_disk() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let key = CacheKey::new(Path::new("x.png"), OutputFormat::Webp);

        cache.put(&key, Bytes::from(&b"webp bytes"[..])).unwrap();

        assert_eq!(fs::read(tmp.path().join("x.webp")).unwrap(), b"webp bytes");
        assert_eq!(&*cache.get(&key).unwrap().unwrap(), b"webp bytes");
    }

    #[test]
    fn put_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let key = CacheKey::new(Path::new("x.png"), OutputFormat::Avif);
        cache.put(&key, Bytes::from(&b"a"[..])).unwrap();
        cache.put(&key, Bytes::from(&b"b"[..])).unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["x.avif"]);
        assert_eq!(fs::read(tmp.path().join("x.avif")).unwrap(), b"b");
    }

    #[test]
    fn open_preloads_existing_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cover.avif"), b"old avif").unwrap();

        let cache = DiskCache::open(tmp.path()).unwrap();
        assert_eq!(cache.len(), 1);

        let key = CacheKey::new(Path::new("elsewhere/cover.png"), OutputFormat::Avif);
        assert_eq!(&*cache.get(&key).unwrap().unwrap(), b"old avif");
    }

    #[test]
    fn open_ignores_temp_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".tmpAbc123"), b"torn").unwrap();
        fs::create_dir(tmp.path().join("subdir")).unwrap();

        let cache = DiskCache::open(tmp.path()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn dot_prefixed_source_is_reloaded() {
        let tmp = TempDir::new().unwrap();
        let key = CacheKey::new(Path::new("post/.hero.png"), OutputFormat::Avif);
        DiskCache::open(tmp.path())
            .unwrap()
            .put(&key, Bytes::from(&b"hero"[..]))
            .unwrap();

        let reopened = DiskCache::open(tmp.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(&*reopened.get(&key).unwrap().unwrap(), b"hero");
    }

    #[test]
    fn empty_ignores_existing_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cover.avif"), b"old").unwrap();

        let cache = DiskCache::empty(tmp.path()).unwrap();
        let key = CacheKey::new(Path::new("cover.png"), OutputFormat::Avif);
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn preloaded_entry_survives_file_deletion_once_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.webp"), b"data").unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let key = CacheKey::new(Path::new("a.png"), OutputFormat::Webp);

        cache.get(&key).unwrap();
        fs::remove_file(tmp.path().join("a.webp")).unwrap();
        assert_eq!(&*cache.get(&key).unwrap().unwrap(), b"data");
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats { hits: 5, misses: 2 };
        assert_eq!(format!("{}", s), "5 cached, 2 encoded (7 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let mut s = CacheStats::default();
        s.miss();
        s.miss();
        s.miss();
        assert_eq!(format!("{}", s), "3 encoded");
    }
}
