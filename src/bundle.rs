//! Bundle host: drives a [`BuildPlugin`] and publishes what it emits.
//!
//! The pipeline is written against a small plugin protocol (build start,
//! resolve, load, build end). This module is the host side of that
//! protocol. It is deliberately simple: every emitted chunk is resolved and
//! loaded once, nothing is parsed or tree-shaken, and every chunk is written
//! as its own file.
//!
//! ## Output layout
//!
//! ```text
//! public/
//! ├── meta.js                      # chunk with an exact file name
//! ├── hello-world-1a2b3c4d.js      # chunk, content-hashed
//! ├── assets/
//! │   ├── cover-5e6f7a8b.avif
//! │   ├── cover-9c0d1e2f.webp
//! │   └── cover-3a4b5c6d.png
//! ├── bundle-manifest.json         # emitted id → file name
//! └── sitemap.xml                  # written by the plugin itself
//! ```
//!
//! ## Staging
//!
//! Everything, including files the plugin writes into
//! [`BuildOptions::out_dir`], is assembled in a sibling staging directory
//! (`.public.partial`). Only after the barrier has passed and every file has
//! been written are the files moved into the real output directory. A
//! failed build leaves the output directory exactly as it was. Files in the
//! output directory that the build does not produce are left alone.

use crate::codegen::FILE_URL_PREFIX;
use crate::emit::{AssetEmitter, AssetSource, EmittedFile, EmittedFiles, FileName};
use crate::types::{AssetId, ModuleId};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// File the host writes next to the bundle, mapping ids to file names.
pub const MANIFEST_FILE: &str = "bundle-manifest.json";

/// Subdirectory for emitted assets.
pub const ASSETS_DIR: &str = "assets";

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{hook} failed: {source}")]
    Plugin {
        hook: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("no plugin resolved chunk '{0}'")]
    Unresolved(String),
    #[error("module {0} has no source")]
    NotLoaded(ModuleId),
    #[error("asset {id} ({name}) has no content after build end")]
    PendingAsset { id: AssetId, name: String },
    #[error("reference to unknown emitted file `{0}`")]
    UnknownReference(String),
    #[error("manifest serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleError {
    /// The plugin's own error, if a hook failed.
    pub fn plugin_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            BundleError::Plugin { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Options passed to [`BuildPlugin::build_start`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory the plugin may write extra files into.
    pub out_dir: PathBuf,
}

/// Hooks a pipeline implements to take part in a bundle.
pub trait BuildPlugin {
    type Error: Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Called once, before anything is resolved. Emits chunks and assets.
    fn build_start(
        &mut self,
        ctx: &Arc<dyn AssetEmitter>,
        options: &BuildOptions,
    ) -> Result<(), Self::Error>;

    /// Map a specifier to a module id, or `None` to leave it to the host.
    fn resolve_id(&self, specifier: &str, importer: Option<&Path>) -> Option<ModuleId>;

    /// Source text for `id`, or `None` if this plugin does not provide it.
    fn load(&self, id: &ModuleId) -> Option<String>;

    /// Called once after every module is loaded, or after a failure with the
    /// failure as `error`.
    fn build_end(&mut self, error: Option<&(dyn Error + 'static)>) -> Result<(), Self::Error>;
}

/// Summary of a published bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub out_dir: PathBuf,
    pub assets: usize,
    pub chunks: usize,
    /// Every published file, relative to `out_dir`, sorted.
    pub published: Vec<PathBuf>,
}

/// Staging directory used while assembling a bundle for `out_dir`.
pub fn staging_dir(out_dir: &Path) -> PathBuf {
    let name = out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let parent = out_dir.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{name}.partial"))
}

/// Run `plugin` and publish the result into `out_dir`.
pub fn bundle<P: BuildPlugin>(plugin: &mut P, out_dir: &Path) -> Result<BundleReport, BundleError> {
    let staging = staging_dir(out_dir);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let (assets, chunks) = match assemble(plugin, &staging) {
        Ok(counts) => counts,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    fs::create_dir_all(out_dir)?;
    let published = publish(&staging, out_dir)?;
    fs::remove_dir_all(&staging)?;

    Ok(BundleReport {
        out_dir: out_dir.to_path_buf(),
        assets,
        chunks,
        published,
    })
}

/// Run the plugin hooks and write every emitted file into `staging`.
fn assemble<P: BuildPlugin>(plugin: &mut P, staging: &Path) -> Result<(usize, usize), BundleError> {
    let emitted = Arc::new(EmittedFiles::new());
    let ctx: Arc<dyn AssetEmitter> = emitted.clone();
    let options = BuildOptions {
        out_dir: staging.to_path_buf(),
    };

    if let Err(e) = plugin.build_start(&ctx, &options) {
        let _ = plugin.build_end(Some(&e));
        return Err(BundleError::Plugin {
            hook: "build_start",
            source: Box::new(e),
        });
    }

    let mut sources: HashMap<AssetId, String> = HashMap::new();
    for (id, specifier, _) in emitted.chunks() {
        match load_chunk(plugin, &specifier) {
            Ok(source) => {
                sources.insert(id, source);
            }
            Err(e) => {
                let _ = plugin.build_end(Some(&e));
                return Err(e);
            }
        }
    }

    plugin
        .build_end(None)
        .map_err(|e| BundleError::Plugin {
            hook: "build_end",
            source: Box::new(e),
        })?;

    let files = emitted.take_files();

    // Assets first: chunk hashes cover the asset URLs they reference.
    let mut names: HashMap<AssetId, String> = HashMap::new();
    let mut asset_count = 0;
    for (id, file) in &files {
        if let EmittedFile::Asset { name, source } = file {
            let bytes = match source {
                AssetSource::Ready(bytes) => bytes,
                AssetSource::Pending => {
                    return Err(BundleError::PendingAsset {
                        id: *id,
                        name: name.clone(),
                    });
                }
            };
            let file_name = format!("{ASSETS_DIR}/{}", hashed_name(name, bytes));
            write_file(&staging.join(&file_name), bytes)?;
            names.insert(*id, file_name);
            asset_count += 1;
        }
    }

    let mut chunk_sources = Vec::new();
    for (id, file) in &files {
        if let EmittedFile::Chunk { file_name, .. } = file {
            let source = sources
                .remove(id)
                .ok_or_else(|| BundleError::UnknownReference(id.to_string()))?;
            let name = match file_name {
                FileName::Exact(name) => name.clone(),
                FileName::Hashed(stem) => {
                    let with_assets = substitute(&source, &names, true)?;
                    hashed_name(&format!("{stem}.js"), with_assets.as_bytes())
                }
            };
            names.insert(*id, name.clone());
            chunk_sources.push((name, source));
        }
    }

    let chunk_count = chunk_sources.len();
    for (name, source) in chunk_sources {
        let resolved = substitute(&source, &names, false)?;
        write_file(&staging.join(&name), resolved.as_bytes())?;
    }

    let manifest: BTreeMap<String, &String> =
        names.iter().map(|(id, name)| (id.to_string(), name)).collect();
    write_file(
        &staging.join(MANIFEST_FILE),
        serde_json::to_string_pretty(&manifest)?.as_bytes(),
    )?;

    Ok((asset_count, chunk_count))
}

fn load_chunk<P: BuildPlugin>(plugin: &P, specifier: &str) -> Result<String, BundleError> {
    let id = plugin
        .resolve_id(specifier, None)
        .ok_or_else(|| BundleError::Unresolved(specifier.to_string()))?;
    plugin.load(&id).ok_or(BundleError::NotLoaded(id))
}

/// `<stem>-<first 8 hex digits of sha256>.<ext>`
fn hashed_name(name: &str, content: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(content));
    let hash = &digest[..8];
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{stem}-{hash}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{hash}"),
    }
}

/// Replace every `import.meta.FILE_URL_<id>` with a quoted relative URL.
///
/// With `partial`, ids without a known name are left in place instead of
/// failing.
fn substitute(
    source: &str,
    names: &HashMap<AssetId, String>,
    partial: bool,
) -> Result<String, BundleError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(pos) = rest.find(FILE_URL_PREFIX) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + FILE_URL_PREFIX.len()..];
        let token = after.get(..8).unwrap_or(after);
        let name = AssetId::parse(token).and_then(|id| names.get(&id));
        match name {
            Some(name) => {
                let _ = write!(out, "'./{name}'");
            }
            None if partial && token.len() == 8 => {
                out.push_str(FILE_URL_PREFIX);
                out.push_str(token);
            }
            None => {
                return Err(BundleError::UnknownReference(format!(
                    "{FILE_URL_PREFIX}{token}"
                )));
            }
        }
        rest = &after[token.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// Move every file under `staging` to the same relative path under `out_dir`.
fn publish(staging: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let mut published = Vec::new();
    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .to_path_buf();
        let target = out_dir.join(&rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(entry.path(), &target)?;
        published.push(rel);
    }
    published.sort();
    Ok(published)
}
