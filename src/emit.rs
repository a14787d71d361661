//! Files handed to the host for the final bundle.
//!
//! An emitted file is either an **asset** (raw bytes, e.g. an image variant)
//! or a **chunk** (a module the host resolves, loads and writes as its own
//! file). Both get an [`AssetId`] the moment they are emitted, so generated
//! source can reference them before anything is written.
//!
//! Assets may be emitted without content and filled in later with
//! [`AssetEmitter::set_asset_source`]. The host refuses to finish a bundle
//! while any asset is still pending.

use crate::types::{AssetId, Bytes};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EmitError {
    #[error("no emitted file with id {0}")]
    UnknownId(AssetId),
    #[error("asset {0} already has content")]
    AlreadySet(AssetId),
    #[error("{0} is a chunk, not an asset")]
    NotAnAsset(AssetId),
}

/// Output file name policy for a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    /// `<stem>-<hash8>.js`
    Hashed(String),
    /// Written under exactly this name.
    Exact(String),
}

/// Emission side of the plugin context.
pub trait AssetEmitter: Send + Sync {
    /// Register an asset. `None` leaves the content pending.
    fn emit_asset(&self, name: &str, source: Option<Bytes>) -> AssetId;

    /// Register a module the host must resolve, load and write.
    fn emit_chunk(&self, specifier: &str, file_name: FileName) -> AssetId;

    /// Fill in the content of a pending asset. Each asset is set once.
    fn set_asset_source(&self, id: AssetId, source: Bytes) -> Result<(), EmitError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetSource {
    Pending,
    Ready(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmittedFile {
    Asset { name: String, source: AssetSource },
    Chunk { specifier: String, file_name: FileName },
}

/// In-memory emitter used by the bundle host.
///
/// Ids are indices into the emission list, so they are dense and stable for
/// one build.
#[derive(Debug, Default)]
pub struct EmittedFiles {
    files: Mutex<Vec<EmittedFile>>,
}

impl EmittedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EmittedFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, file: EmittedFile) -> AssetId {
        let mut files = self.lock();
        files.push(file);
        AssetId::from_index(files.len() - 1)
    }

    /// Every chunk emitted so far, in emission order.
    pub fn chunks(&self) -> Vec<(AssetId, String, FileName)> {
        self.lock()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match f {
                EmittedFile::Chunk {
                    specifier,
                    file_name,
                } => Some((AssetId::from_index(i), specifier.clone(), file_name.clone())),
                EmittedFile::Asset { .. } => None,
            })
            .collect()
    }

    /// Ids of assets whose content has not been set.
    pub fn pending(&self) -> Vec<AssetId> {
        self.lock()
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                matches!(
                    f,
                    EmittedFile::Asset {
                        source: AssetSource::Pending,
                        ..
                    }
                )
            })
            .map(|(i, _)| AssetId::from_index(i))
            .collect()
    }

    pub fn get(&self, id: AssetId) -> Option<EmittedFile> {
        self.lock().get(id.index()).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything emitted, leaving the emitter empty.
    pub fn take_files(&self) -> Vec<(AssetId, EmittedFile)> {
        std::mem::take(&mut *self.lock())
            .into_iter()
            .enumerate()
            .map(|(i, f)| (AssetId::from_index(i), f))
            .collect()
    }
}

impl AssetEmitter for EmittedFiles {
    fn emit_asset(&self, name: &str, source: Option<Bytes>) -> AssetId {
        self.push(EmittedFile::Asset {
            name: name.to_string(),
            source: source.map_or(AssetSource::Pending, AssetSource::Ready),
        })
    }

    fn emit_chunk(&self, specifier: &str, file_name: FileName) -> AssetId {
        self.push(EmittedFile::Chunk {
            specifier: specifier.to_string(),
            file_name,
        })
    }

    fn set_asset_source(&self, id: AssetId, bytes: Bytes) -> Result<(), EmitError> {
        let mut files = self.lock();
        match files.get_mut(id.index()) {
            None => Err(EmitError::UnknownId(id)),
            Some(EmittedFile::Chunk { .. }) => Err(EmitError::NotAnAsset(id)),
            Some(EmittedFile::Asset {
                source: AssetSource::Ready(_),
                ..
            }) => Err(EmitError::AlreadySet(id)),
            Some(EmittedFile::Asset { source, .. }) => {
                *source = AssetSource::Ready(bytes);
                Ok(())
            }
        }
    }
}
