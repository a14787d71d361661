//! Escaping for JavaScript string literals in generated module source.
//!
//! Generated modules embed user text in two literal forms:
//!
//! | Context | Literal | Escaped |
//! |---|---|---|
//! | [`Literal::Single`] | `'…'` | `'` `"` `\` `` ` `` LF CR U+2028 U+2029 |
//! | [`Literal::Template`] | `` `…` `` | `\` `` ` `` `${` CR |
//!
//! CR is escaped in template literals because JavaScript normalizes a raw
//! CR (and CRLF) inside a template to LF. [`unescape`] is the inverse of
//! [`escape`] for every input.

use std::borrow::Cow;
use thiserror::Error;

/// The kind of literal the escaped text will be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    /// Single-quoted string literal.
    Single,
    /// Backtick-delimited template literal.
    Template,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EscapeError {
    #[error("dangling backslash at end of literal")]
    DanglingBackslash,
    #[error("unsupported escape sequence `\\{0}`")]
    Unsupported(char),
    #[error("invalid unicode escape `\\u{0}`")]
    InvalidUnicode(String),
}

/// Escape `text` so it can be placed verbatim between the delimiters of `ctx`.
pub fn escape(text: &str, ctx: Literal) -> Cow<'_, str> {
    let needs_escape = match ctx {
        Literal::Single => text.contains(['\'', '"', '\\', '`', '\n', '\r', '\u{2028}', '\u{2029}']),
        Literal::Template => text.contains(['\\', '`', '\r']) || text.contains("${"),
    };
    if !needs_escape {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match (ctx, c) {
            (_, '\\') => out.push_str("\\\\"),
            (_, '`') => out.push_str("\\`"),
            (_, '\r') => out.push_str("\\r"),
            (Literal::Single, '\'') => out.push_str("\\'"),
            (Literal::Single, '"') => out.push_str("\\\""),
            (Literal::Single, '\n') => out.push_str("\\n"),
            (Literal::Single, '\u{2028}') => out.push_str("\\u2028"),
            (Literal::Single, '\u{2029}') => out.push_str("\\u2029"),
            (Literal::Template, '$') if chars.peek() == Some(&'{') => out.push_str("\\$"),
            (_, other) => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Decode the escape sequences of a literal body, as JavaScript would.
///
/// Covers every sequence [`escape`] produces plus `\t`, `\0` and `\uXXXX`.
pub fn unescape(literal: &str, ctx: Literal) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let next = chars.next().ok_or(EscapeError::DanglingBackslash)?;
        match next {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\\' | '\'' | '"' | '`' => out.push(next),
            '$' if ctx == Literal::Template => out.push('$'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| EscapeError::InvalidUnicode(hex.clone()))?;
                out.push(decoded);
            }
            other => return Err(EscapeError::Unsupported(other)),
        }
    }
    Ok(out)
}
