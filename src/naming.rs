//! Post directory naming convention: `<date>--<slug>`.
//!
//! Every post lives in a directory whose name carries both its publication
//! date and its URL slug, separated by the first `--`:
//!
//! - `2021-01-01--hello-world` → date=`2021-01-01`, slug=`hello-world`
//! - `2021-01-01--a--b` → date=`2021-01-01`, slug=`a--b`
//!
//! The date segment is opaque text: it is copied into the metadata as-is and
//! never parsed as a calendar date.

use thiserror::Error;

const SEPARATOR: &str = "--";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("post directory name has no `--` separator: {0}")]
    MissingSeparator(String),
    #[error("post directory name has an empty date segment: {0}")]
    EmptyDate(String),
    #[error("post directory name has an empty slug segment: {0}")]
    EmptySlug(String),
}

/// Result of decomposing a post directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDirName {
    pub date: String,
    pub slug: String,
}

impl PostDirName {
    /// Site-relative URL of the post.
    pub fn url(&self) -> String {
        format!("/{}", self.slug)
    }
}

/// Split a directory name on the first `--` into date and slug.
pub fn parse_post_dir_name(name: &str) -> Result<PostDirName, NamingError> {
    let (date, slug) = name
        .split_once(SEPARATOR)
        .ok_or_else(|| NamingError::MissingSeparator(name.to_string()))?;
    if date.is_empty() {
        return Err(NamingError::EmptyDate(name.to_string()));
    }
    if slug.is_empty() {
        return Err(NamingError::EmptySlug(name.to_string()));
    }
    Ok(PostDirName {
        date: date.to_string(),
        slug: slug.to_string(),
    })
}
