//! Front matter parsing for `index.md`.
//!
//! A post file starts with a YAML block fenced by `---` lines, followed by
//! the Markdown body:
//!
//! ```text
//! ---
//! title: "Hello"
//! category: "Test"
//! author: "A"
//! cover: "cover.png"
//! abstract: "One-line teaser"
//! ---
//! Body text…
//! ```
//!
//! `title`, `category`, `author` and `cover` are required. `date` is optional
//! and, when present, is still overridden by the directory-name date. Keys the
//! site does not know about are ignored.

use gray_matter::Matter;
use gray_matter::engine::YAML;
use serde::Deserialize;
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("file is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("missing opening `---` front matter delimiter")]
    MissingOpening,
    #[error("front matter is empty or not closed by a `---` line")]
    Unterminated,
    #[error("invalid front matter: {0}")]
    Invalid(String),
}

/// Structured front matter of a post.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrontMatter {
    pub title: String,
    pub category: String,
    pub author: String,
    /// Cover image path, relative to the post directory.
    pub cover: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "abstract")]
    pub summary: String,
}

/// A post split into front matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPost {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// Split raw file bytes into front matter and body.
pub fn parse(raw: &[u8]) -> Result<ParsedPost, FrontMatterError> {
    let text = std::str::from_utf8(raw)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.lines().next().map(str::trim_end) != Some(DELIMITER) {
        return Err(FrontMatterError::MissingOpening);
    }

    let parsed = Matter::<YAML>::new().parse(text);
    let front_matter: FrontMatter = parsed
        .data
        .ok_or(FrontMatterError::Unterminated)?
        .deserialize()
        .map_err(|e| FrontMatterError::Invalid(e.to_string()))?;
    Ok(ParsedPost {
        front_matter,
        body: parsed.content,
    })
}
