//! External collaborators at the fetch boundary.
//!
//! The engine never retrieves or flattens anything itself: a
//! [`DocumentSource`] hands it local, already-downloaded documents and an
//! [`IdentifierResolver`] answers "does this archetype name+version exist
//! as a citeable identifier". The directory-backed implementations below
//! read a cache directory that the (out-of-scope) retrieval layer keeps
//! populated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IngestError, Result};

/// Delivers raw source documents by logical identifier.
///
/// For archetypes, flattening (specialization resolution) has already
/// happened on the other side of this boundary; implementations return the
/// canonical JSON of the flattened form.
pub trait DocumentSource: Send + Sync {
    /// Dataset-export XML for one (codebook, dataset, language).
    fn dataset_xml(&self, codebook: &str, dataset_id: &str, language: &str) -> Result<String>;

    /// Canonical JSON of a flattened archetype.
    fn flattened_archetype(&self, archetype_id: &str) -> Result<String>;
}

/// Resolves a candidate archetype name + version to a concrete citeable
/// identifier. `Ok(None)` means "no such identifier, try the next version".
pub trait IdentifierResolver: Send + Sync {
    fn resolve(&self, name: &str, version: &str) -> Result<Option<String>>;
}

/// Source backed by a local cache directory.
///
/// Layout: `<root>/<codebook>/datasets/<dataset_id>.<language>.xml` and
/// `<root>/archetypes/<archetype_id>.json` (archetype identifiers are
/// globally unique, so they are not codebook-scoped).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &Path) -> Result<String> {
        debug!(path = %path.display(), "reading source document");
        fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => IngestError::MissingDocument {
                identifier: path.display().to_string(),
            },
            _ => IngestError::io(path, source),
        })
    }

    fn archetype_path(&self, archetype_id: &str) -> PathBuf {
        self.root
            .join("archetypes")
            .join(format!("{archetype_id}.json"))
    }
}

impl DocumentSource for DirectorySource {
    fn dataset_xml(&self, codebook: &str, dataset_id: &str, language: &str) -> Result<String> {
        let path = self
            .root
            .join(codebook)
            .join("datasets")
            .join(format!("{dataset_id}.{language}.xml"));
        self.read(&path)
    }

    fn flattened_archetype(&self, archetype_id: &str) -> Result<String> {
        self.read(&self.archetype_path(archetype_id))
    }
}

impl IdentifierResolver for DirectorySource {
    /// A candidate resolves when its flattened form is present in the
    /// cache directory.
    fn resolve(&self, name: &str, version: &str) -> Result<Option<String>> {
        let identifier = format!("{name}.{version}");
        if self.archetype_path(&identifier).is_file() {
            Ok(Some(identifier))
        } else {
            Ok(None)
        }
    }
}
