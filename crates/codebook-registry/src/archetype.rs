//! Parsed archetype with the lookup surface both builders need.

use codebook_ingest::{Archetype, CObject, ValueSet};

/// An external-terminology binding for one local code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermBinding {
    /// Terminology name as declared in the bindings table.
    pub terminology: String,
    /// Code in that terminology, the trailing path segment of the URI.
    pub code: String,
    /// The full binding URI.
    pub uri: String,
}

/// A flattened archetype plus term/binding/value-set accessors.
///
/// Term lookups return a sentinel, never an error: a missing translation is
/// an everyday condition in multi-language archetypes and the tree must
/// still build.
#[derive(Debug, Clone)]
pub struct ArchetypeRecord {
    archetype: Archetype,
}

impl ArchetypeRecord {
    pub fn new(archetype: Archetype) -> Self {
        Self { archetype }
    }

    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    pub fn id(&self) -> &str {
        &self.archetype.archetype_id
    }

    /// Root of the flattened object graph.
    pub fn definition(&self) -> &CObject {
        &self.archetype.definition
    }

    /// Declared languages.
    pub fn languages(&self) -> &[String] {
        &self.archetype.languages
    }

    /// Declared version string.
    pub fn version(&self) -> &str {
        self.archetype.version()
    }

    /// Term text for a (code, language) pair; `?<code>?` when missing.
    pub fn term_text(&self, language: &str, code: &str) -> String {
        self.term(language, code)
            .map(|t| t.text.clone())
            .unwrap_or_else(|| format!("?{code}?"))
    }

    /// Term description for a (code, language) pair; `?<code>?` when
    /// missing.
    pub fn term_description(&self, language: &str, code: &str) -> String {
        self.term(language, code)
            .map(|t| t.description.clone())
            .unwrap_or_else(|| format!("?{code}?"))
    }

    fn term(&self, language: &str, code: &str) -> Option<&codebook_ingest::ArchetypeTerm> {
        self.archetype
            .terminology
            .term_definitions
            .get(language)
            .or_else(|| {
                self.archetype
                    .terminology
                    .term_definitions
                    .get(&self.archetype.original_language)
            })
            .and_then(|terms| terms.get(code))
    }

    /// First external binding for a local code, with the bound code taken
    /// from the URI's trailing path segment.
    pub fn binding_for(&self, code: &str) -> Option<TermBinding> {
        for (terminology, codes) in &self.archetype.terminology.term_bindings {
            if let Some(uri) = codes.get(code) {
                return Some(TermBinding {
                    terminology: terminology.clone(),
                    code: trailing_segment(uri).to_string(),
                    uri: uri.clone(),
                });
            }
        }
        None
    }

    /// Value set by ac-code.
    pub fn value_set(&self, id: &str) -> Option<&ValueSet> {
        self.archetype.terminology.value_sets.get(id)
    }
}

fn trailing_segment(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    trimmed
        .rsplit(['/', '#'])
        .next()
        .unwrap_or(trimmed)
}
