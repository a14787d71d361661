//! Shared test utilities for the mdbuild test suite.
//!
//! Builds throwaway project trees in a [`TempDir`]:
//!
//! ```text
//! <tmp>/
//! └── content/posts/
//!     ├── 2021-01-01--hello-world/
//!     │   ├── index.md        # code block, math, one embedded image
//!     │   ├── hello.png       # cover
//!     │   └── diagram.png     # embedded
//!     └── 2021-02-14--second-post/
//!         ├── index.md
//!         └── second.png      # cover
//! ```
//!
//! Covers have distinct file stems so they never share a cache entry.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_project();
//! write_post(
//!     &tmp.path().join("content/posts"),
//!     "2022-01-01--extra",
//!     &post_markdown("Extra", "cover.png", "Body"),
//! );
//! ```

use image::{ImageFormat, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a small gradient PNG.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

/// `index.md` content with a complete front matter block.
pub fn post_markdown(title: &str, cover: &str, body: &str) -> String {
    format!(
        "---\ntitle: \"{title}\"\ncategory: \"Test\"\nauthor: \"A\"\ncover: \"{cover}\"\nabstract: \"About {title}\"\n---\n{body}"
    )
}

/// Create `content_root/dir/index.md` and return the post directory.
pub fn write_post(content_root: &Path, dir: &str, index_md: &str) -> PathBuf {
    let post_dir = content_root.join(dir);
    fs::create_dir_all(&post_dir).unwrap();
    fs::write(post_dir.join("index.md"), index_md).unwrap();
    post_dir
}

/// A project root with two posts under `content/posts`.
pub fn setup_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let content_root = tmp.path().join("content/posts");

    let hello = write_post(
        &content_root,
        "2021-01-01--hello-world",
        &post_markdown(
            "Hello World",
            "hello.png",
            "Intro with $x^2$ inline.\n\n\
             ![A diagram](diagram.png)\n\n\
             ```rust\nfn main() {}\n```\n",
        ),
    );
    write_test_png(&hello.join("hello.png"), 8, 6);
    write_test_png(&hello.join("diagram.png"), 4, 4);

    let second = write_post(
        &content_root,
        "2021-02-14--second-post",
        &post_markdown("Second Post", "second.png", "Plain `text` only.\n"),
    );
    write_test_png(&second.join("second.png"), 8, 6);

    tmp
}
