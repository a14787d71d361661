use clap::{Parser, Subcommand};
use mdbuild::bundle::{self, BundleError};
use mdbuild::config::{self, BuildConfig};
use mdbuild::imaging::RustBackend;
use mdbuild::pipeline::{self, MdBuild, PipelineError};
use mdbuild::{clean, output};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared flags for commands that convert images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the image cache and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "mdbuild")]
#[command(about = "Build-time content pipeline for a Markdown blog")]
#[command(long_about = "\
Build-time content pipeline for a Markdown blog

Every post is a directory named <date>--<slug> holding index.md and its
images. A build turns them into versioned static files: one JS module per
post, a metadata module listing every post, AVIF/WebP/original variants of
each image, a highlight stylesheet and a sitemap.

Project structure:

  mdbuild.toml                     # Optional config (see gen-config)
  content/posts/
  ├── 2021-01-01--hello-world/
  │   ├── index.md                 # YAML front matter + Markdown body
  │   ├── cover.png                # Named by the `cover:` key
  │   └── diagram.png              # Referenced from the body
  └── 2021-02-14--second-post/
      └── ...
  .cache/                          # Converted images, reused across builds
  public/                          # Published bundle (hand-written files kept)

Front matter:
  title, category, author, cover   required
  abstract                         optional teaser
  date                             ignored, the directory name wins

Run 'mdbuild gen-config' to generate a documented mdbuild.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root holding mdbuild.toml and the content
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Config file to use instead of <project>/mdbuild.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every post and publish the bundle into out_dir
    Build(CacheArgs),
    /// Validate the content root without converting or writing anything
    Check,
    /// Remove the image cache and generated files in out_dir
    Clean,
    /// Print a stock mdbuild.toml with all options documented
    GenConfig,
}

/// Build failure, printed with its error kind.
#[derive(thiserror::Error)]
#[error("{0}")]
struct BuildFailed(String);

impl fmt::Debug for BuildFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Build(cache_args) => {
            let config = load_config(&cli)?;
            build(&cli.project, config, !cache_args.no_cache)?;
        }
        Command::Check => {
            let config = load_config(&cli)?;
            let content_root = cli.project.join(&config.content_root);
            println!("==> Checking {}", content_root.display());
            let posts = pipeline::check(&cli.project, &config).map_err(|e| classify(&e))?;
            output::print_check_output(&posts);
            println!("==> Content is valid");
        }
        Command::Clean => {
            let config = load_config(&cli)?;
            let report = clean::clean(
                &cli.project.join(&config.cache_dir),
                &cli.project.join(&config.out_dir),
                &config.clean.keep,
            )?;
            output::print_clean_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<BuildConfig, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(&cli.project),
    }
}

fn build(
    project: &Path,
    config: BuildConfig,
    use_cache: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(&config.processing);
    let content_root = project.join(&config.content_root);
    let out_dir = project.join(&config.out_dir);
    println!(
        "==> Building {} \u{2192} {}",
        content_root.display(),
        out_dir.display()
    );

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    });

    let mut plugin = MdBuild::new(project, config, Arc::new(RustBackend::new()))
        .map_err(|e| classify(&e))?
        .with_cache(use_cache)
        .with_events(tx);
    let result = bundle::bundle(&mut plugin, &out_dir);
    let stats = plugin.cache_stats();
    // Closes the event channel so the printer can finish.
    drop(plugin);
    printer
        .join()
        .map_err(|_| BuildFailed("output thread panicked".to_string()))?;

    let report = result.map_err(|e| describe(&e))?;
    println!();
    output::print_bundle_report(&report);
    println!("Cache: {}", stats);
    println!("==> Build complete: {}", out_dir.display());
    Ok(())
}

fn classify(err: &PipelineError) -> BuildFailed {
    BuildFailed(format!("{} error: {}", err.kind(), err))
}

fn describe(err: &BundleError) -> BuildFailed {
    match err
        .plugin_error()
        .and_then(|e| e.downcast_ref::<PipelineError>())
    {
        Some(e) => classify(e),
        None => BuildFailed(format!("bundle error: {err}")),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
