//! Markdown to HTML for post bodies.
//!
//! Rendering is plain pulldown-cmark with three custom hooks:
//!
//! - **Images** become a `<picture>` with AVIF, WebP and baseline variants.
//!   Each `src` is resolved against the post directory and handed to
//!   [`ImageAssetLoader::load_deferred`]; the returned asset ids end up in the
//!   output as [`Segment::AssetUrl`], never as text.
//! - **Code blocks** are highlighted by syntect with class-based spans and
//!   wrapped in `<pre><code class="hljs LANG">`. An unknown language falls
//!   back to the configured default, then to plain text.
//! - **Math** (`$…$`, `$$…$$`) is converted to MathML.
//!
//! The renderer never touches shared task state. The conversions it starts
//! are returned in [`RenderedPost::tasks`] for the caller to queue.

use crate::loader::{ImageAssetLoader, LoadError};
use crate::tasks::PendingTask;
use crate::imaging::OutputFormat;
use crate::types::{AssetId, ImageAssetIds};
use latex2mathml::{DisplayStyle, latex_to_mathml};
use maud::{PreEscaped, html};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use std::path::Path;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

/// Delimits an asset-url marker in the intermediate HTML string.
/// Replaced in the input before parsing, so only markers produce it.
const MARKER: char = '\0';

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid math `{tex}`: {message}")]
    Math { tex: String, message: String },
    #[error("syntax highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
    #[error("unknown highlight theme '{0}'")]
    UnknownTheme(String),
    #[error(transparent)]
    Image(#[from] LoadError),
}

/// Piece of rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// URL of an emitted asset, known only once the host has written it.
    AssetUrl(AssetId),
}

/// Rendered HTML as text interleaved with asset URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedHtml {
    segments: Vec<Segment>,
}

impl RenderedHtml {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::AssetUrl(id) => Some(*id),
            Segment::Text(_) => None,
        })
    }

    /// Split the marked-up HTML produced during rendering back into segments.
    fn from_marked(html: &str, urls: &[AssetId]) -> Self {
        let mut segments = Vec::new();
        for (i, part) in html.split(MARKER).enumerate() {
            let url = (i % 2 == 1)
                .then(|| part.parse::<usize>().ok().and_then(|n| urls.get(n)))
                .flatten();
            match url {
                Some(id) => segments.push(Segment::AssetUrl(*id)),
                None if part.is_empty() => {}
                None => match segments.last_mut() {
                    Some(Segment::Text(text)) => text.push_str(part),
                    _ => segments.push(Segment::Text(part.to_string())),
                },
            }
        }
        Self { segments }
    }
}

/// Output of [`MarkdownRenderer::render`].
#[derive(Debug)]
pub struct RenderedPost {
    pub html: RenderedHtml,
    /// Conversions started for embedded images.
    pub tasks: Vec<PendingTask>,
}

pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    theme: Theme,
    default_language: String,
}

impl MarkdownRenderer {
    pub fn new(default_language: &str, theme: &str) -> Result<Self, RenderError> {
        let theme = ThemeSet::load_defaults()
            .themes
            .remove(theme)
            .ok_or_else(|| RenderError::UnknownTheme(theme.to_string()))?;
        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
            default_language: default_language.to_string(),
        })
    }

    /// Stylesheet for the highlight classes, for the configured theme.
    pub fn theme_css(&self) -> Result<String, RenderError> {
        Ok(css_for_theme_with_class_style(&self.theme, ClassStyle::Spaced)?)
    }

    /// Render one post body. Images are resolved relative to `base_path`.
    pub fn render(
        &self,
        body: &str,
        base_path: &Path,
        loader: &ImageAssetLoader,
    ) -> Result<RenderedPost, RenderError> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_MATH);

        let mut events: Vec<Event<'_>> = Vec::new();
        let mut urls: Vec<AssetId> = Vec::new();
        let mut tasks = Vec::new();
        let mut code: Option<(String, String)> = None;
        let mut image: Option<OpenImage> = None;

        // Raw HTML and code blocks pass NUL through untouched.
        let body = body.replace(MARKER, "\u{FFFD}");

        for event in Parser::new_ext(&body, options) {
            if let Some(open) = image.as_mut() {
                match event {
                    Event::Start(Tag::Image { .. }) => open.depth += 1,
                    Event::End(TagEnd::Image) if open.depth > 0 => open.depth -= 1,
                    Event::End(TagEnd::Image) => {
                        let markup = picture(&open.ids, &open.alt, &mut urls);
                        events.push(Event::InlineHtml(markup.into()));
                        image = None;
                    }
                    Event::Text(text) | Event::Code(text) => open.alt.push_str(&text),
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    code = Some((lang, String::new()));
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, buf)) = code.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, buf)) = code.take() {
                        events.push(Event::Html(self.code_block(&buf, &lang)?.into()));
                    }
                }
                Event::Start(Tag::Image { dest_url, .. }) => {
                    let deferred = loader.load_deferred(&base_path.join(dest_url.as_ref()))?;
                    tasks.push(deferred.completion);
                    image = Some(OpenImage {
                        ids: deferred.ids,
                        alt: String::new(),
                        depth: 0,
                    });
                }
                Event::InlineMath(tex) => {
                    events.push(Event::InlineHtml(math(&tex, DisplayStyle::Inline)?));
                }
                Event::DisplayMath(tex) => {
                    events.push(Event::InlineHtml(math(&tex, DisplayStyle::Block)?));
                }
                other => events.push(other),
            }
        }

        let mut marked = String::with_capacity(body.len() * 3 / 2);
        md_html::push_html(&mut marked, events.into_iter());

        Ok(RenderedPost {
            html: RenderedHtml::from_marked(&marked, &urls),
            tasks,
        })
    }

    /// Resolve a fence language, falling back to the default, then plain text.
    fn syntax_for<'a>(&'a self, lang: &'a str) -> (&'a SyntaxReference, &'a str) {
        if !lang.is_empty() {
            if let Some(syntax) = self.syntaxes.find_syntax_by_token(lang) {
                return (syntax, lang);
            }
        }
        match self.syntaxes.find_syntax_by_token(&self.default_language) {
            Some(syntax) => (syntax, &self.default_language),
            None => (self.syntaxes.find_syntax_plain_text(), "plaintext"),
        }
    }

    fn code_block(&self, code: &str, lang: &str) -> Result<String, RenderError> {
        let (syntax, label) = self.syntax_for(lang);
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        let highlighted = generator.finalize();

        Ok(html! {
            pre { code class=(format!("hljs {label}")) { (PreEscaped(highlighted)) } }
        }
        .into_string())
    }
}

/// Image whose alt text is still being collected.
struct OpenImage {
    ids: ImageAssetIds,
    alt: String,
    /// Images nested inside the alt text.
    depth: usize,
}

fn marker(id: AssetId, urls: &mut Vec<AssetId>) -> String {
    urls.push(id);
    format!("{MARKER}{}{MARKER}", urls.len() - 1)
}

fn picture(ids: &ImageAssetIds, alt: &str, urls: &mut Vec<AssetId>) -> String {
    let avif = marker(ids.avif, urls);
    let webp = marker(ids.webp, urls);
    let baseline = marker(ids.baseline, urls);
    html! {
        picture {
            source type=(OutputFormat::Avif.mime_type()) srcset=(avif);
            source type=(OutputFormat::Webp.mime_type()) srcset=(webp);
            img src=(baseline) alt=(alt) loading="lazy" decoding="async";
        }
    }
    .into_string()
}

fn math(tex: &str, style: DisplayStyle) -> Result<CowStr<'static>, RenderError> {
    latex_to_mathml(tex, style)
        .map(CowStr::from)
        .map_err(|e| RenderError::Math {
            tex: tex.to_string(),
            message: e.to_string(),
        })
}
