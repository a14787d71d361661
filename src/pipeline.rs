//! The content pipeline, as a build plugin.
//!
//! [`MdBuild`] turns the content root into emitted files through the
//! [`BuildPlugin`] hooks:
//!
//! ```text
//! build_start
//!   ├── open image cache (.cache/)
//!   ├── write highlight.css
//!   ├── for each <date>--<slug>/ (sorted)
//!   │     ├── index.md → front matter + body
//!   │     ├── cover image → avif/webp/baseline, converted now
//!   │     ├── body → HTML, embedded images converted on the pool
//!   │     └── <slug>.js chunk: export const CONTENT = `…`;
//!   ├── meta.js chunk: export default [ … ];
//!   └── write sitemap.xml
//! resolve_id / load    virtual modules from the registry
//! build_end            wait for every image task
//! ```
//!
//! Any failure in any post aborts the build. There is no per-post isolation
//! and no retry.

use crate::bundle::{BuildOptions, BuildPlugin};
use crate::cache::{CacheStats, DiskCache};
use crate::codegen;
use crate::config::BuildConfig;
use crate::emit::{AssetEmitter, FileName};
use crate::front_matter::{self, FrontMatterError, ParsedPost};
use crate::imaging::{ConvertError, ImageBackend, ImageConverter};
use crate::loader::{ImageAssetLoader, LoadError};
use crate::markdown::{MarkdownRenderer, RenderError};
use crate::naming::{self, NamingError, PostDirName};
use crate::registry::ContentModuleRegistry;
use crate::scan::{self, ScanError};
use crate::sitemap;
use crate::tasks::TaskQueue;
use crate::types::{ModuleId, PostMetadata};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Stylesheet for highlighted code blocks, written next to the bundle.
pub const HIGHLIGHT_CSS: &str = "highlight.css";

const INDEX_FILE: &str = "index.md";

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Content is not laid out the way the pipeline expects.
    InputLayout,
    /// Front matter or Markdown content could not be understood.
    Parse,
    /// An image codec failed.
    Conversion,
    /// Reading or writing files failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InputLayout => "input layout",
            ErrorKind::Parse => "parse",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Io => "io",
        })
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to list posts: {0}")]
    Scan(#[from] ScanError),
    #[error(transparent)]
    DirName(#[from] NamingError),
    #[error("post has no index.md: {}", .0.display())]
    MissingIndex(PathBuf),
    #[error("slug '{slug}' is used by both {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{post}: {source}")]
    FrontMatter {
        post: String,
        source: FrontMatterError,
    },
    #[error("{post}: cover image: {source}")]
    Cover { post: String, source: LoadError },
    #[error("{post}: {source}")]
    Render { post: String, source: RenderError },
    #[error("failed to open image cache {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("highlighting: {0}")]
    Theme(RenderError),
    #[error("image task failed: {0}")]
    Tasks(LoadError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DirName(_)
            | PipelineError::MissingIndex(_)
            | PipelineError::DuplicateSlug { .. } => ErrorKind::InputLayout,
            PipelineError::FrontMatter { .. } | PipelineError::Theme(_) => ErrorKind::Parse,
            PipelineError::Scan(_)
            | PipelineError::Read { .. }
            | PipelineError::Cache { .. }
            | PipelineError::Output { .. } => ErrorKind::Io,
            PipelineError::Cover { source, .. } | PipelineError::Tasks(source) => {
                load_error_kind(source)
            }
            PipelineError::Render { source, .. } => match source {
                RenderError::Image(e) => load_error_kind(e),
                RenderError::Math { .. }
                | RenderError::Highlight(_)
                | RenderError::UnknownTheme(_) => ErrorKind::Parse,
            },
        }
    }
}

fn load_error_kind(error: &LoadError) -> ErrorKind {
    match error {
        LoadError::MissingImage(_) => ErrorKind::InputLayout,
        LoadError::Read { .. } | LoadError::Convert(ConvertError::Cache(_)) => ErrorKind::Io,
        LoadError::Convert(ConvertError::Backend { .. })
        | LoadError::Emit(_)
        | LoadError::TaskAbandoned(_) => ErrorKind::Conversion,
    }
}

/// Progress reported while a build runs.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    PostRendered {
        /// 1-based position in build order.
        index: usize,
        dir: String,
        title: String,
        url: String,
        embedded_images: usize,
    },
    MetadataWritten {
        posts: usize,
    },
    SitemapWritten {
        path: PathBuf,
        urls: usize,
    },
    TasksDrained {
        tasks: usize,
        stats: CacheStats,
    },
}

/// A post directory that passed the layout and front matter checks.
struct SourcePost {
    dir: String,
    path: PathBuf,
    name: PostDirName,
    parsed: ParsedPost,
}

/// Read and validate one post directory.
fn read_post(content_root: &Path, dir: &str) -> Result<SourcePost, PipelineError> {
    let name = naming::parse_post_dir_name(dir)?;
    let path = content_root.join(dir);
    let index = path.join(INDEX_FILE);
    if !index.is_file() {
        return Err(PipelineError::MissingIndex(index));
    }
    let raw = std::fs::read(&index).map_err(|source| PipelineError::Read {
        path: index.clone(),
        source,
    })?;
    let parsed = front_matter::parse(&raw).map_err(|source| PipelineError::FrontMatter {
        post: dir.to_string(),
        source,
    })?;
    Ok(SourcePost {
        dir: dir.to_string(),
        path,
        name,
        parsed,
    })
}

/// Read every post under `content_root`, rejecting duplicate slugs.
fn read_posts(content_root: &Path) -> Result<Vec<SourcePost>, PipelineError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut posts = Vec::new();
    for dir in scan::list_post_dirs(content_root)? {
        let post = read_post(content_root, &dir)?;
        if let Some(first) = seen.insert(post.name.slug.clone(), dir.clone()) {
            return Err(PipelineError::DuplicateSlug {
                slug: post.name.slug,
                first,
                second: dir,
            });
        }
        posts.push(post);
    }
    Ok(posts)
}

pub struct MdBuild {
    project_root: PathBuf,
    config: BuildConfig,
    backend: Arc<dyn ImageBackend>,
    renderer: MarkdownRenderer,
    use_cache: bool,
    events: Option<Sender<BuildEvent>>,
    registry: ContentModuleRegistry,
    tasks: TaskQueue,
    posts: Vec<PostMetadata>,
    converter: Option<Arc<ImageConverter>>,
}

impl MdBuild {
    pub fn new(
        project_root: &Path,
        config: BuildConfig,
        backend: Arc<dyn ImageBackend>,
    ) -> Result<Self, PipelineError> {
        let renderer = MarkdownRenderer::new(
            &config.markdown.default_language,
            &config.markdown.theme,
        )
        .map_err(PipelineError::Theme)?;
        let registry = ContentModuleRegistry::new(project_root, &config.meta_module_path());
        Ok(Self {
            project_root: project_root.to_path_buf(),
            config,
            backend,
            renderer,
            use_cache: true,
            events: None,
            registry,
            tasks: TaskQueue::new(),
            posts: Vec::new(),
            converter: None,
        })
    }

    /// With `false`, existing cache files are ignored (but still overwritten).
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Metadata records built so far, in build order.
    pub fn posts(&self) -> &[PostMetadata] {
        &self.posts
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.converter
            .as_ref()
            .map(|c| c.stats())
            .unwrap_or_default()
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            // A gone printer is not a build failure.
            let _ = tx.send(event);
        }
    }

    fn content_root(&self) -> PathBuf {
        self.project_root.join(&self.config.content_root)
    }

    fn open_converter(&self) -> Result<Arc<ImageConverter>, PipelineError> {
        let dir = self.project_root.join(&self.config.cache_dir);
        let cache = if self.use_cache {
            DiskCache::open(&dir)
        } else {
            DiskCache::empty(&dir)
        }
        .map_err(|source| PipelineError::Cache {
            path: dir.clone(),
            source,
        })?;
        Ok(Arc::new(ImageConverter::new(
            Arc::clone(&self.backend),
            Arc::new(cache),
            self.config.encode_settings(),
        )))
    }

    fn write_stylesheet(&self, out_dir: &Path) -> Result<(), PipelineError> {
        let css = self.renderer.theme_css().map_err(PipelineError::Theme)?;
        let path = out_dir.join(HIGHLIGHT_CSS);
        std::fs::write(&path, css).map_err(|source| PipelineError::Output { path, source })
    }

    /// Cover, body and module for one post.
    fn build_post(
        &mut self,
        index: usize,
        post: SourcePost,
        ctx: &Arc<dyn AssetEmitter>,
        loader: &ImageAssetLoader,
    ) -> Result<(), PipelineError> {
        let SourcePost {
            dir,
            path,
            name,
            parsed,
        } = post;
        let fm = parsed.front_matter;

        let cover_images = loader
            .load_awaited(&path.join(&fm.cover))
            .map_err(|source| PipelineError::Cover {
                post: dir.clone(),
                source,
            })?;

        let rendered = self
            .renderer
            .render(&parsed.body, &path, loader)
            .map_err(|source| PipelineError::Render {
                post: dir.clone(),
                source,
            })?;
        let embedded_images = rendered.tasks.len();
        self.tasks.extend(rendered.tasks);

        let module_id = ModuleId::new(format!("{}.js", name.slug));
        self.registry
            .register(module_id.clone(), codegen::post_module(&rendered.html));
        let content_module_ref =
            ctx.emit_chunk(module_id.as_str(), FileName::Hashed(name.slug.clone()));

        let url = name.url();
        self.emit(BuildEvent::PostRendered {
            index,
            dir,
            title: fm.title.clone(),
            url: url.clone(),
            embedded_images,
        });
        self.posts.push(PostMetadata {
            title: fm.title,
            category: fm.category,
            author: fm.author,
            summary: fm.summary,
            date: name.date,
            url,
            cover_images,
            content_module_ref,
        });
        Ok(())
    }
}

impl BuildPlugin for MdBuild {
    type Error = PipelineError;

    fn name(&self) -> &str {
        "mdbuild"
    }

    fn build_start(
        &mut self,
        ctx: &Arc<dyn AssetEmitter>,
        options: &BuildOptions,
    ) -> Result<(), PipelineError> {
        self.registry.reserve(ModuleId::meta());

        let converter = self.open_converter()?;
        self.converter = Some(Arc::clone(&converter));
        let loader = ImageAssetLoader::new(converter, Arc::clone(ctx));

        self.write_stylesheet(&options.out_dir)?;

        for (i, post) in read_posts(&self.content_root())?.into_iter().enumerate() {
            self.build_post(i + 1, post, ctx, &loader)?;
        }

        self.registry
            .register(ModuleId::meta(), codegen::meta_module(&self.posts));
        let meta_specifier = self.registry.meta_path().to_string_lossy().into_owned();
        ctx.emit_chunk(&meta_specifier, FileName::Exact("meta.js".to_string()));
        self.emit(BuildEvent::MetadataWritten {
            posts: self.posts.len(),
        });

        let urls: Vec<String> = self.posts.iter().map(|p| p.url.clone()).collect();
        let path = sitemap::generate(&self.config.base_url, &urls, &options.out_dir).map_err(
            |source| PipelineError::Output {
                path: options.out_dir.join("sitemap.xml"),
                source,
            },
        )?;
        self.emit(BuildEvent::SitemapWritten {
            path,
            urls: urls.len() + 1,
        });
        Ok(())
    }

    fn resolve_id(&self, specifier: &str, importer: Option<&Path>) -> Option<ModuleId> {
        self.registry.resolve_id(specifier, importer)
    }

    fn load(&self, id: &ModuleId) -> Option<String> {
        self.registry.load(id).map(str::to_string)
    }

    fn build_end(&mut self, error: Option<&(dyn Error + 'static)>) -> Result<(), PipelineError> {
        if error.is_some() {
            return Ok(());
        }
        let tasks = self.tasks.join_all().map_err(PipelineError::Tasks)?;
        self.emit(BuildEvent::TasksDrained {
            tasks,
            stats: self.cache_stats(),
        });
        Ok(())
    }
}

/// Summary of one post found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedPost {
    pub dir: String,
    pub title: String,
    pub url: String,
    pub cover: PathBuf,
}

/// Validate the content root without converting or writing anything.
///
/// Checks directory names, `index.md`, front matter, slug uniqueness and
/// that each cover image exists. Embedded images are only checked by a
/// real build.
pub fn check(project_root: &Path, config: &BuildConfig) -> Result<Vec<CheckedPost>, PipelineError> {
    let content_root = project_root.join(&config.content_root);
    read_posts(&content_root)?
        .into_iter()
        .map(|post| {
            let cover = post.path.join(&post.parsed.front_matter.cover);
            if !cover.is_file() {
                return Err(PipelineError::Cover {
                    post: post.dir,
                    source: LoadError::MissingImage(cover),
                });
            }
            Ok(CheckedPost {
                url: post.name.url(),
                title: post.parsed.front_matter.title,
                dir: post.dir,
                cover,
            })
        })
        .collect()
}
