//! Generated module source text.
//!
//! Two kinds of modules are generated:
//!
//! ```text
//! <slug>.js    export const CONTENT = `<rendered html>`;
//! meta.js      export default [ { title, category, imgUrls, ..., html }, ... ];
//! ```
//!
//! Emitted files are referenced through `import.meta.FILE_URL_<id>` tokens,
//! which the host replaces with a relative URL once file names are known.
//! Every piece of text from a post goes through [`escape`] for the literal
//! it lands in. Text that happens to spell a placeholder is written with the
//! `_` escaped, which decodes to the same string but is never substituted.

use crate::escape::{Literal, escape};
use crate::markdown::{RenderedHtml, Segment};
use crate::types::{AssetId, PostMetadata};
use std::fmt::Write as _;

/// Prefix of the placeholder the host substitutes with a file URL.
pub const FILE_URL_PREFIX: &str = "import.meta.FILE_URL_";

const GUARDED_PREFIX: &str = "import.meta.FILE\\u005fURL_";

pub fn file_url_token(id: AssetId) -> String {
    format!("{FILE_URL_PREFIX}{id}")
}

/// Expression evaluating to the absolute URL of an emitted file.
pub fn asset_url_expr(id: AssetId) -> String {
    format!("new URL({}, import.meta.url).href", file_url_token(id))
}

/// Zero-argument loader importing an emitted chunk on demand.
pub fn lazy_import_expr(id: AssetId) -> String {
    format!("() => import({})", file_url_token(id))
}

/// Body of a template literal holding `html`, asset URLs interpolated.
pub fn template_literal_body(html: &RenderedHtml) -> String {
    let mut out = String::new();
    for segment in html.segments() {
        match segment {
            Segment::Text(text) => out.push_str(&literal_text(text, Literal::Template)),
            Segment::AssetUrl(id) => {
                let _ = write!(out, "${{{}}}", asset_url_expr(*id));
            }
        }
    }
    out
}

/// Per-post module exporting the rendered HTML.
pub fn post_module(html: &RenderedHtml) -> String {
    format!("export const CONTENT = `{}`;\n", template_literal_body(html))
}

/// Escape `text` for `ctx` so that it cannot be mistaken for a placeholder.
fn literal_text(text: &str, ctx: Literal) -> String {
    escape(text, ctx).replace(FILE_URL_PREFIX, GUARDED_PREFIX)
}

fn quoted(text: &str) -> String {
    format!("'{}'", literal_text(text, Literal::Single))
}

/// Aggregate metadata module, one record per post in the given order.
pub fn meta_module(posts: &[PostMetadata]) -> String {
    let mut out = String::from("export default [");
    for post in posts {
        let _ = write!(
            out,
            "
    {{
        title: {title},
        category: {category},
        imgUrls: {{
            avif: {avif},
            webp: {webp},
            jpeg: {jpeg}
        }},
        author: {author},
        date: {date},
        url: {url},
        html: {html},
        abstract: {summary}
    }},",
            title = quoted(&post.title),
            category = quoted(&post.category),
            avif = asset_url_expr(post.cover_images.avif),
            webp = asset_url_expr(post.cover_images.webp),
            jpeg = asset_url_expr(post.cover_images.baseline),
            author = quoted(&post.author),
            date = quoted(&post.date),
            url = quoted(&post.url),
            html = lazy_import_expr(post.content_module_ref),
            summary = quoted(&post.summary),
        );
    }
    if !posts.is_empty() {
        out.push('\n');
    }
    out.push_str("];\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::unescape;
    use crate::types::ImageAssetIds;

    fn id(n: usize) -> AssetId {
        AssetId::from_index(n)
    }

    fn post(title: &str) -> PostMetadata {
        PostMetadata {
            title: title.to_string(),
            category: "Test".into(),
            author: "A".into(),
            summary: "It's short.".into(),
            date: "2021-01-01".into(),
            url: "/hello-world".into(),
            cover_images: ImageAssetIds {
                avif: id(0),
                webp: id(1),
                baseline: id(2),
            },
            content_module_ref: id(3),
        }
    }

    #[test]
    fn url_expressions() {
        assert_eq!(file_url_token(id(7)), "import.meta.FILE_URL_00000007");
        assert_eq!(
            asset_url_expr(id(7)),
            "new URL(import.meta.FILE_URL_00000007, import.meta.url).href"
        );
        assert_eq!(
            lazy_import_expr(id(7)),
            "() => import(import.meta.FILE_URL_00000007)"
        );
    }

    #[test]
    fn empty_meta_module_is_an_empty_array() {
        assert_eq!(meta_module(&[]), "export default [];\n");
    }

    #[test]
    fn meta_module_record_shape() {
        let js = meta_module(&[post("Hello")]);
        assert!(js.starts_with("export default [\n    {"));
        assert!(js.ends_with("},\n];\n"));
        assert!(js.contains("title: 'Hello',"));
        assert!(js.contains("avif: new URL(import.meta.FILE_URL_00000000, import.meta.url).href,"));
        assert!(js.contains("jpeg: new URL(import.meta.FILE_URL_00000002, import.meta.url).href"));
        assert!(js.contains("html: () => import(import.meta.FILE_URL_00000003),"));
        assert!(js.contains("abstract: 'It\\'s short.'"));
        assert!(js.contains("url: '/hello-world',"));
    }

    #[test]
    fn meta_module_cannot_be_broken_out_of() {
        let title = "x', evil: alert(1), y: '\n\u{2028}";
        let js = meta_module(&[post(title)]);
        let line = js.lines().find(|l| l.trim_start().starts_with("title:")).unwrap();
        let literal = line
            .trim()
            .strip_prefix("title: '")
            .and_then(|s| s.strip_suffix("',"))
            .unwrap();
        assert_eq!(unescape(literal, Literal::Single).unwrap(), title);
    }

    #[test]
    fn post_module_interpolates_asset_urls() {
        let html = RenderedHtml::from_segments(vec![
            Segment::Text("<img src=\"".into()),
            Segment::AssetUrl(id(5)),
            Segment::Text("\"> `tick` ${x}".into()),
        ]);
        assert_eq!(
            post_module(&html),
            "export const CONTENT = `<img src=\"${new URL(import.meta.FILE_URL_00000005, import.meta.url).href}\"> \\`tick\\` \\${x}`;\n"
        );
    }

    #[test]
    fn text_spelling_a_placeholder_is_not_one() {
        let text = "see import.meta.FILE_URL_00000000 here";
        let html = RenderedHtml::from_segments(vec![Segment::Text(text.into())]);
        let body = template_literal_body(&html);
        assert!(!body.contains(FILE_URL_PREFIX));
        assert_eq!(unescape(&body, Literal::Template).unwrap(), text);

        let js = meta_module(&[post(text)]);
        assert_eq!(js.matches(FILE_URL_PREFIX).count(), 4);
    }

    #[test]
    fn post_module_text_round_trips() {
        let text = "a\\b `c` ${d} $e {f}\r\n";
        let html = RenderedHtml::from_segments(vec![Segment::Text(text.into())]);
        let body = template_literal_body(&html);
        assert_eq!(unescape(&body, Literal::Template).unwrap(), text);
    }
}
