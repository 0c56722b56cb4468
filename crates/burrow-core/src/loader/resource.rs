use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where a provider should look for a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum SearchLocation {
    /// The provider's own root
    #[default]
    Root,
    /// A sub-location of the root; absolute paths replace the root
    Path(PathBuf),
}

impl std::fmt::Display for SearchLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchLocation::Root => f.write_str("<root>"),
            SearchLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Source of raw schema bytes
///
/// `Ok(None)` means nothing matched; `Err` means the lookup itself failed.
pub trait ResourceProvider: Send + Sync {
    fn fetch(
        &self,
        name: &str,
        extension: &str,
        location: &SearchLocation,
    ) -> io::Result<Option<Vec<u8>>>;
}

/// Resources stored as `{root}/{location}/{name}.{extension}` files
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a resource would live at
    pub fn resolve(&self, name: &str, extension: &str, location: &SearchLocation) -> PathBuf {
        let dir = match location {
            SearchLocation::Root => self.root.clone(),
            SearchLocation::Path(path) => self.root.join(path),
        };
        dir.join(format!("{}.{}", name, extension))
    }
}

impl ResourceProvider for DirectoryResources {
    fn fetch(
        &self,
        name: &str,
        extension: &str,
        location: &SearchLocation,
    ) -> io::Result<Option<Vec<u8>>> {
        let path = self.resolve(name, extension, location);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory resources, e.g. schemas embedded with `include_bytes!`
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    entries: HashMap<(SearchLocation, String, String), Vec<u8>>,
}

impl StaticResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(
        mut self,
        location: SearchLocation,
        name: &str,
        extension: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(location, name, extension, bytes);
        self
    }

    pub fn insert(
        &mut self,
        location: SearchLocation,
        name: &str,
        extension: &str,
        bytes: impl Into<Vec<u8>>,
    ) {
        self.entries.insert(
            (location, name.to_string(), extension.to_string()),
            bytes.into(),
        );
    }
}

impl ResourceProvider for StaticResources {
    fn fetch(
        &self,
        name: &str,
        extension: &str,
        location: &SearchLocation,
    ) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&(location.clone(), name.to_string(), extension.to_string()))
            .cloned())
    }
}
