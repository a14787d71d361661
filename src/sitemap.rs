//! `sitemap.xml` for the site root and every post.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

const URLSET_OPEN: &str = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:news="http://www.google.com/schemas/sitemap-news/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml" xmlns:mobile="http://www.google.com/schemas/sitemap-mobile/1.0" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1" xmlns:video="http://www.google.com/schemas/sitemap-video/1.1">"#;

/// Render the sitemap document. `/` always comes first, then `urls` in order.
pub fn render_sitemap(base_url: &str, urls: &[String]) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(URLSET_OPEN);
    xml.push('\n');
    for url in std::iter::once("/").chain(urls.iter().map(String::as_str)) {
        xml.push_str("<url><loc>");
        xml.push_str(&escape_xml(&format!("{base}{url}")));
        xml.push_str("</loc><changefreq>daily</changefreq><priority>0.7</priority></url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Write `target_dir/sitemap.xml` and return its path.
pub fn generate(base_url: &str, urls: &[String], target_dir: &Path) -> io::Result<PathBuf> {
    let path = target_dir.join("sitemap.xml");
    std::fs::write(&path, render_sitemap(base_url, urls))?;
    Ok(path)
}

fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}
