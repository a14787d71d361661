//! Content root scanning.
//!
//! Every immediate subdirectory of the content root is one post:
//!
//! ```text
//! content/posts/                    # Content root
//! ├── meta.js                       # (virtual) metadata module path
//! ├── 2021-01-01--hello-world/      # One post
//! │   ├── index.md                  # Front matter + Markdown body
//! │   ├── cover.png                 # Cover image (named by `cover:`)
//! │   └── diagram.png               # Embedded image
//! └── 2021-02-14--second-post/
//!     └── ...
//! ```
//!
//! Files at the root level are ignored, as are hidden directories.
//! Names are returned sorted so one build produces the same metadata order
//! on every platform.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Content root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Failed to walk content root: {0}")]
    Walk(#[from] walkdir::Error),
}

/// List the names of the immediate subdirectories of `root`.
pub fn list_post_dirs(root: &Path) -> Result<Vec<String>, ScanError> {
    let meta = std::fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
