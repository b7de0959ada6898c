//! Where template text comes from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::SourceError;

/// Produces the raw bytes of a template by name.
///
/// Implementations are shared across render threads. Any closure of the
/// right shape is a provider:
///
/// ```rust
/// use grog_template::{SourceError, SourceProvider};
///
/// let provider = |name: &str| -> Result<Vec<u8>, SourceError> {
///     Ok(format!("<h1>{name}</h1>").into_bytes())
/// };
/// assert_eq!(provider.fetch("home").unwrap(), b"<h1>home</h1>");
/// ```
pub trait SourceProvider: Send + Sync {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError>;
}

impl<F> SourceProvider for F
where
    F: Fn(&str) -> Result<Vec<u8>, SourceError> + Send + Sync,
{
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        self(name)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Templates held in memory. Entries can be replaced while the engine is
/// running; pair with [`Engine::invalidate`](crate::Engine::invalidate).
#[derive(Debug, Default)]
pub struct MemorySource {
    templates: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&self, name: impl Into<String>, text: impl Into<Vec<u8>>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), text.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

impl SourceProvider for MemorySource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DirSource
// ---------------------------------------------------------------------------

/// Templates read from files under an asset directory; the template name is
/// the relative path (`partials/header.html`).
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a template name to a file under the root. Names that are empty,
    /// absolute or climb out with `..` are refused.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SourceError> {
        let rel = Path::new(name);
        let mut path = self.root.clone();
        let mut pushed = false;
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    pushed = true;
                }
                Component::CurDir => {}
                _ => return Err(SourceError::InvalidName(name.to_string())),
            }
        }
        if !pushed {
            return Err(SourceError::InvalidName(name.to_string()));
        }
        Ok(path)
    }
}

impl SourceProvider for DirSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(name.to_string()),
            _ => SourceError::Io { path, source: e },
        })
    }
}
