//! CLI output formatting for builds, checks and cleans.
//!
//! # Information-First Display
//!
//! Every post is shown by its positional index and title, with the
//! directory it came from as an indented `Source:` line. Files are shown
//! relative to the directory they were written to.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! 001 Hello World → /hello-world
//!     Source: 2021-01-01--hello-world/
//!     Images: 1 embedded
//! 002 Second Post → /second-post
//!     Source: 2021-02-14--second-post/
//! Metadata: 2 posts → meta.js
//! Sitemap: 3 URLs → sitemap.xml
//! Images: 1 deferred conversion finished
//!
//! Published 9 assets, 3 chunks → public
//!     assets/cover-1a2b3c4d.avif
//!     ...
//! ```
//!
//! ## Check
//!
//! ```text
//! Posts
//! 001 Hello World → /hello-world
//!     Source: 2021-01-01--hello-world/
//!     Cover: hello.png
//! ```
//!
//! ## Clean
//!
//! ```text
//! Removed image cache
//! Removed meta.js
//! Kept index.html
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and, where main needs it, a `print_*` wrapper that writes to
//! stdout. Format functions are pure.

use crate::bundle::BundleReport;
use crate::clean::CleanReport;
use crate::pipeline::{BuildEvent, CheckedPost};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `001 Title → /url`
fn post_header(index: usize, title: &str, url: &str) -> String {
    format!("{} {} \u{2192} {}", format_index(index), title, url)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::PostRendered {
            index,
            dir,
            title,
            url,
            embedded_images,
        } => {
            let mut lines = vec![
                post_header(*index, title, url),
                format!("{}Source: {}/", indent(1), dir),
            ];
            if *embedded_images > 0 {
                lines.push(format!("{}Images: {} embedded", indent(1), embedded_images));
            }
            lines
        }
        BuildEvent::MetadataWritten { posts } => {
            vec![format!("Metadata: {} \u{2192} meta.js", plural(*posts, "post", "posts"))]
        }
        BuildEvent::SitemapWritten { path, urls } => vec![format!(
            "Sitemap: {} \u{2192} {}",
            plural(*urls, "URL", "URLs"),
            file_name(path)
        )],
        BuildEvent::TasksDrained { tasks, .. } => vec![format!(
            "Images: {} finished",
            plural(*tasks, "deferred conversion", "deferred conversions")
        )],
    }
}

/// Format the published files of a bundle.
pub fn format_bundle_report(report: &BundleReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Published {}, {} \u{2192} {}",
        plural(report.assets, "asset", "assets"),
        plural(report.chunks, "chunk", "chunks"),
        report.out_dir.display()
    )];
    for file in &report.published {
        lines.push(format!(
            "{}{}",
            indent(1),
            file.to_string_lossy().replace('\\', "/")
        ));
    }
    lines
}

pub fn print_bundle_report(report: &BundleReport) {
    for line in format_bundle_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the posts found by a content check.
pub fn format_check_output(posts: &[CheckedPost]) -> Vec<String> {
    if posts.is_empty() {
        return vec!["No posts found".to_string()];
    }
    let mut lines = vec!["Posts".to_string()];
    for (i, post) in posts.iter().enumerate() {
        lines.push(post_header(i + 1, &post.title, &post.url));
        lines.push(format!("{}Source: {}/", indent(1), post.dir));
        lines.push(format!("{}Cover: {}", indent(1), file_name(&post.cover)));
    }
    lines
}

pub fn print_check_output(posts: &[CheckedPost]) {
    for line in format_check_output(posts) {
        println!("{}", line);
    }
}

// ============================================================================
// Clean
// ============================================================================

pub fn format_clean_report(report: &CleanReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.cache_removed {
        lines.push("Removed image cache".to_string());
    }
    if report.staging_removed {
        lines.push("Removed unfinished build".to_string());
    }
    for path in &report.removed {
        lines.push(format!("Removed {}", file_name(path)));
    }
    for path in &report.kept {
        lines.push(format!("Kept {}", file_name(path)));
    }
    if lines.is_empty() {
        lines.push("Nothing to clean".to_string());
    }
    lines
}

pub fn print_clean_report(report: &CleanReport) {
    for line in format_clean_report(report) {
        println!("{}", line);
    }
}
