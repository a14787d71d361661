//! One source image in, three emitted assets out.
//!
//! Every image referenced by a post is published as three variants: AVIF,
//! WebP and a raw copy of the original file (the baseline for browsers that
//! support neither). The loader composes the [`ImageConverter`] with the
//! host's [`AssetEmitter`] and offers two modes:
//!
//! - [`ImageAssetLoader::load_deferred`] hands out the ids immediately and
//!   fills the content from a worker task. Used for images inside a post
//!   body, where the ids only need to appear in generated text.
//! - [`ImageAssetLoader::load_awaited`] converts on the calling thread and
//!   returns once all three assets have content. Used for cover images.

use crate::emit::{AssetEmitter, EmitError};
use crate::imaging::{ConvertError, ImageConverter, OutputFormat};
use crate::tasks::PendingTask;
use crate::types::{Bytes, ImageAssetIds};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("image not found: {}", .0.display())]
    MissingImage(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("task '{0}' ended without reporting a result")]
    TaskAbandoned(String),
}

/// Ids handed out by [`ImageAssetLoader::load_deferred`] plus the task that
/// fills them.
#[derive(Debug)]
pub struct DeferredImage {
    pub ids: ImageAssetIds,
    pub completion: PendingTask,
}

/// Converted content of the three variants.
struct Variants {
    avif: Bytes,
    webp: Bytes,
    baseline: Bytes,
}

#[derive(Clone)]
pub struct ImageAssetLoader {
    converter: Arc<ImageConverter>,
    emitter: Arc<dyn AssetEmitter>,
}

impl ImageAssetLoader {
    pub fn new(converter: Arc<ImageConverter>, emitter: Arc<dyn AssetEmitter>) -> Self {
        Self { converter, emitter }
    }

    /// Emit three pending assets for `source` and start filling them.
    ///
    /// A missing file is reported here rather than at the build-end barrier.
    pub fn load_deferred(&self, source: &Path) -> Result<DeferredImage, LoadError> {
        ensure_exists(source)?;
        let names = AssetNames::for_source(source);
        let ids = ImageAssetIds {
            avif: self.emitter.emit_asset(&names.avif, None),
            webp: self.emitter.emit_asset(&names.webp, None),
            baseline: self.emitter.emit_asset(&names.baseline, None),
        };

        let converter = Arc::clone(&self.converter);
        let emitter = Arc::clone(&self.emitter);
        let path = source.to_path_buf();
        let completion = PendingTask::spawn(source.display().to_string(), move || {
            let variants = convert_all(&converter, &path)?;
            emitter.set_asset_source(ids.avif, variants.avif)?;
            emitter.set_asset_source(ids.webp, variants.webp)?;
            emitter.set_asset_source(ids.baseline, variants.baseline)?;
            Ok(())
        });

        Ok(DeferredImage { ids, completion })
    }

    /// Convert `source` now and emit all three assets with content.
    pub fn load_awaited(&self, source: &Path) -> Result<ImageAssetIds, LoadError> {
        ensure_exists(source)?;
        let names = AssetNames::for_source(source);
        let variants = convert_all(&self.converter, source)?;
        Ok(ImageAssetIds {
            avif: self.emitter.emit_asset(&names.avif, Some(variants.avif)),
            webp: self.emitter.emit_asset(&names.webp, Some(variants.webp)),
            baseline: self
                .emitter
                .emit_asset(&names.baseline, Some(variants.baseline)),
        })
    }
}

struct AssetNames {
    avif: String,
    webp: String,
    baseline: String,
}

impl AssetNames {
    fn for_source(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let baseline = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            avif: format!("{stem}.{}", OutputFormat::Avif.extension()),
            webp: format!("{stem}.{}", OutputFormat::Webp.extension()),
            baseline,
        }
    }
}

fn ensure_exists(source: &Path) -> Result<(), LoadError> {
    if source.is_file() {
        Ok(())
    } else {
        Err(LoadError::MissingImage(source.to_path_buf()))
    }
}

fn convert_all(converter: &ImageConverter, source: &Path) -> Result<Variants, LoadError> {
    let baseline: Bytes = std::fs::read(source)
        .map_err(|e| LoadError::Read {
            path: source.to_path_buf(),
            source: e,
        })?
        .into();
    Ok(Variants {
        avif: converter.convert(source, OutputFormat::Avif)?,
        webp: converter.convert(source, OutputFormat::Webp)?,
        baseline,
    })
}
