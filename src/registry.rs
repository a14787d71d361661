//! Virtual modules served to the host.
//!
//! The registry maps a [`ModuleId`] to the source text the pipeline
//! generated for it. It lives for one build and never evicts.
//!
//! ## Resolution rules
//!
//! 1. A specifier that is already a registered id resolves to itself.
//! 2. A `.js` specifier that points at the configured metadata module path
//!    resolves to the metadata id. The specifier is joined to the importer's
//!    directory (or the project root when there is no importer) and
//!    normalized lexically; the file does not need to exist.
//! 3. Anything else is left to the host.

use crate::types::ModuleId;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualModule {
    /// Generated source text.
    Chunk(String),
    /// Id handed out, source not generated yet.
    Pending,
}

#[derive(Debug)]
pub struct ContentModuleRegistry {
    modules: BTreeMap<ModuleId, VirtualModule>,
    project_root: PathBuf,
    meta_path: PathBuf,
}

impl ContentModuleRegistry {
    /// `meta_path` is taken relative to `project_root` unless absolute.
    pub fn new(project_root: &Path, meta_path: &Path) -> Self {
        Self {
            modules: BTreeMap::new(),
            project_root: normalize(project_root),
            meta_path: normalize(&project_root.join(meta_path)),
        }
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// Make `id` known without source. Existing entries are left alone.
    pub fn reserve(&mut self, id: ModuleId) {
        self.modules.entry(id).or_insert(VirtualModule::Pending);
    }

    pub fn register(&mut self, id: ModuleId, source: String) {
        self.modules.insert(id, VirtualModule::Chunk(source));
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn resolve_id(&self, specifier: &str, importer: Option<&Path>) -> Option<ModuleId> {
        let id = ModuleId::new(specifier);
        if self.modules.contains_key(&id) {
            return Some(id);
        }
        if !specifier.ends_with(".js") {
            return None;
        }
        let dir = importer
            .and_then(Path::parent)
            .unwrap_or(self.project_root.as_path());
        (normalize(&dir.join(specifier)) == self.meta_path).then(ModuleId::meta)
    }

    /// Source text for `id`, or `None` for unknown and pending modules.
    pub fn load(&self, id: &ModuleId) -> Option<&str> {
        match self.modules.get(id)? {
            VirtualModule::Chunk(source) => Some(source),
            VirtualModule::Pending => None,
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
