//! `mdbuild clean`: remove the image cache and generated output.
//!
//! The output directory usually also holds hand-written files (the site's
//! `index.html`, `robots.txt`). Top-level files named in the keep-list
//! survive; every other file and every subdirectory is removed. A staging
//! directory left behind by an interrupted build is removed too.

use crate::bundle::staging_dir;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What [`clean`] removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub cache_removed: bool,
    pub staging_removed: bool,
    /// Entries removed from the output directory, sorted.
    pub removed: Vec<PathBuf>,
    /// Entries left in place because they are in the keep-list, sorted.
    pub kept: Vec<PathBuf>,
}

/// Remove `cache_dir` and generated files in `out_dir`. Missing directories
/// are not an error.
pub fn clean(cache_dir: &Path, out_dir: &Path, keep: &[String]) -> io::Result<CleanReport> {
    let mut report = CleanReport {
        cache_removed: remove_dir_if_exists(cache_dir)?,
        staging_removed: remove_dir_if_exists(&staging_dir(out_dir))?,
        ..Default::default()
    };

    if !out_dir.is_dir() {
        return Ok(report);
    }

    for entry in fs::read_dir(out_dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
            report.removed.push(path);
            continue;
        }
        let name = entry.file_name();
        if keep.iter().any(|k| name.as_os_str() == k.as_str()) {
            report.kept.push(path);
        } else {
            fs::remove_file(&path)?;
            report.removed.push(path);
        }
    }
    report.removed.sort();
    report.kept.sort();
    Ok(report)
}

fn remove_dir_if_exists(dir: &Path) -> io::Result<bool> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
