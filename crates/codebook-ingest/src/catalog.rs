//! Per-codebook configuration catalog.
//!
//! A small read-only TOML file declares which codebooks exist, which
//! builder applies, where the source lives, and the per-codebook quirks
//! (selectable groups, excluded low-quality translations).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{IngestError, Result};

/// Which builder a codebook uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Dataset-export XML.
    Decor,
    /// Flattened archetype definitions.
    Archetype,
}

/// Settings for one codebook.
#[derive(Debug, Clone, Deserialize)]
pub struct CodebookSettings {
    pub name: String,
    pub kind: SourceKind,
    /// Server/base URI the retrieval layer downloads from.
    pub server: String,
    /// When set, group concepts are selectable items themselves.
    #[serde(default)]
    pub groups_selectable: bool,
    /// Translations known to be low quality, hidden from language pickers.
    #[serde(default)]
    pub excluded_languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "codebook")]
    codebooks: Vec<CodebookSettings>,
}

/// Read-only lookup of codebook settings by name.
#[derive(Debug, Clone, Default)]
pub struct CodebookCatalog {
    codebooks: BTreeMap<String, CodebookSettings>,
}

impl CodebookCatalog {
    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IngestError::io(path, source))?;
        Self::from_toml(&text).map_err(|source| IngestError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: CatalogFile = toml::from_str(text)?;
        let mut codebooks = BTreeMap::new();
        for settings in file.codebooks {
            codebooks.insert(settings.name.clone(), settings);
        }
        Ok(Self { codebooks })
    }

    pub fn get(&self, name: &str) -> Result<&CodebookSettings> {
        self.codebooks
            .get(name)
            .ok_or_else(|| IngestError::UnknownCodebook {
                name: name.to_string(),
            })
    }

    /// Codebook names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codebooks.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodebookSettings> {
        self.codebooks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[codebook]]
        name = "zib2020"
        kind = "decor"
        server = "https://decor.example.org/services/"
        groups_selectable = true
        excluded_languages = ["de-DE"]

        [[codebook]]
        name = "ckm"
        kind = "archetype"
        server = "https://ckm.example.org/"
    "#;

    #[test]
    fn parses_catalog() {
        let catalog = CodebookCatalog::from_toml(CATALOG).expect("parse");
        let zib = catalog.get("zib2020").expect("zib2020");
        assert_eq!(zib.kind, SourceKind::Decor);
        assert!(zib.groups_selectable);
        assert_eq!(zib.excluded_languages, vec!["de-DE"]);

        let ckm = catalog.get("ckm").expect("ckm");
        assert_eq!(ckm.kind, SourceKind::Archetype);
        assert!(!ckm.groups_selectable);
    }

    #[test]
    fn unknown_codebook_errors() {
        let catalog = CodebookCatalog::from_toml(CATALOG).expect("parse");
        assert!(matches!(
            catalog.get("nope"),
            Err(IngestError::UnknownCodebook { .. })
        ));
    }
}
