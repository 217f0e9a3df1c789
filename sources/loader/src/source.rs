use std::{
    collections::HashMap,
    fmt, fs,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::{
    error::LoadError,
    internalise,
    object::loader::{ClassDefinition, ClassFinder},
    security::ProtectionDomain,
};

/// A code source location, such as `file:/opt/app/classes/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supplies raw bytes for resource paths (`a/b/C.class`, `config/app.properties`).
pub trait ByteSource: Send + Sync {
    fn origin(&self) -> &Origin;

    fn contains(&self, path: &str) -> bool;

    /// Read the resource to completion.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin(), path)
    }
}

/// A located resource. Holds on to the source it was found in so it can be read later.
#[derive(Clone)]
pub struct Resource {
    name: String,
    source: Arc<dyn ByteSource>,
}

impl Resource {
    pub fn new(name: impl Into<String>, source: Arc<dyn ByteSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &Origin {
        self.source.origin()
    }

    pub fn url(&self) -> String {
        self.source.url(&self.name)
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.source.read(&self.name)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("origin", self.origin())
            .finish()
    }
}

/// A directory on disk acting as a classpath root.
pub struct DirectorySource {
    root: PathBuf,
    origin: Origin,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let origin = Origin::new(format!("file:{}/", root.display()));

        Self { root, origin }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Resource names are relative and may not climb out of the root
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if path.is_empty() || escapes {
            return None;
        }

        Some(self.root.join(relative))
    }
}

impl ByteSource for DirectorySource {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn contains(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self
            .resolve(path)
            .ok_or(anyhow!("{} is not a valid resource path", path))?;

        Ok(fs::read(resolved)?)
    }
}

/// Resources held in memory, keyed by path.
pub struct MemorySource {
    origin: Origin,
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), bytes.into());
    }
}

impl ByteSource for MemorySource {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or(anyhow!("{} not present in {}", path, self.origin))
    }
}

/// An ordered list of byte sources, searched front to back.
#[derive(Clone, Default)]
pub struct ClassPath {
    sources: Vec<Arc<dyn ByteSource>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self { sources: vec![] }
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.sources.push(Arc::new(DirectorySource::new(path)));
        self
    }

    pub fn add_source(&mut self, source: impl ByteSource + 'static) -> &mut Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn locate(&self, name: &str) -> Option<Resource> {
        self.sources
            .iter()
            .find(|source| source.contains(name))
            .map(|source| Resource::new(name, Arc::clone(source)))
    }

    pub fn locate_all(&self, name: &str) -> Vec<Resource> {
        self.sources
            .iter()
            .filter(|source| source.contains(name))
            .map(|source| Resource::new(name, Arc::clone(source)))
            .collect()
    }
}

impl fmt::Debug for ClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.origin()))
            .finish()
    }
}

impl ClassFinder for ClassPath {
    fn find_class(&self, name: &str) -> Result<ClassDefinition, LoadError> {
        let path = support::names::class_resource_path(name);

        let resource = self
            .locate(&path)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        debug!("Located {} at {}", name, resource.url());
        let bytes = resource.read().map_err(internalise!())?;

        Ok(ClassDefinition {
            name: Some(name.to_string()),
            bytes: bytes.into(),
            domain: Some(ProtectionDomain::from_origin(resource.origin().clone())),
        })
    }

    fn find_resource(&self, name: &str) -> Option<Resource> {
        self.locate(name)
    }

    fn find_resources(&self, name: &str) -> Vec<Resource> {
        self.locate_all(name)
    }
}
