//! DECOR dataset-export documents.
//!
//! The dataset export dialect nests `concept` elements under a `dataset`
//! root. Names and descriptions repeat per language; terminology
//! associations and codesystem declarations may appear anywhere in the
//! document, not only near the concept they describe, so the document is
//! scanned up front into lookup tables (one global table per document, as
//! the source tooling produces them).

use std::collections::BTreeMap;

use crate::error::{IngestError, Result};
use crate::xml::{XmlElement, parse_document};

/// Concept statuses a build descends into. Anything else (deprecated,
/// rejected, cancelled) is skipped silently.
const VALID_STATUS: &[&str] = &["draft", "final"];

/// Mapping of one concept or codelist entry to an external terminology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminologyAssociation {
    pub code: String,
    pub code_system_id: String,
    pub display_name: String,
    pub code_system_name: String,
}

/// A parsed dataset-export document.
#[derive(Debug, Clone)]
pub struct DatasetDocument {
    root: XmlElement,
}

impl DatasetDocument {
    /// Parse a document; the dataset element may be the root itself or sit
    /// below a project wrapper.
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = parse_document(text)?;
        let root = if parsed.name == "dataset" {
            parsed
        } else {
            parsed
                .find_descendant(|e| e.name == "dataset")
                .cloned()
                .ok_or_else(|| IngestError::xml("no dataset element in document"))?
        };
        Ok(Self { root })
    }

    /// The dataset element.
    pub fn dataset(&self) -> &XmlElement {
        &self.root
    }

    /// Dataset id attribute, empty when absent.
    pub fn id(&self) -> &str {
        self.root.attr_or_empty("id")
    }

    /// Dataset display name for a language.
    pub fn name_in(&self, language: &str) -> String {
        text_in(&self.root, "name", language)
    }

    /// Whole-tree concept query by id.
    ///
    /// Codelist entries are `concept` elements too; the query deliberately
    /// does not descend into value domains or value sets so it only finds
    /// real dataset concepts.
    pub fn concept_by_id(&self, id: &str) -> Option<&XmlElement> {
        find_concept(&self.root, id)
    }

    /// Global codesystem-id to codesystem-name table.
    ///
    /// Built from `codeSystem` declarations and from terminology
    /// associations that carry both the id and the name. Lookups that miss
    /// this table fall back to the raw id.
    pub fn code_system_names(&self) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for element in self.root.descendants() {
            if element.name == "codeSystem" {
                if let (Some(id), Some(name)) = (element.attr("id"), element.attr("name")) {
                    names.insert(id.to_string(), name.to_string());
                }
            } else if element.name == "terminologyAssociation" {
                let id = element.attr_or_empty("codeSystem");
                let name = element.attr_or_empty("codeSystemName");
                if !id.is_empty() && !name.is_empty() {
                    names.insert(id.to_string(), name.to_string());
                }
            }
        }
        names
    }

    /// Concept-id to terminology-association map for the whole document.
    ///
    /// When a concept carries several associations the first one wins, in
    /// document order.
    pub fn terminology_associations(&self) -> BTreeMap<String, TerminologyAssociation> {
        let mut map = BTreeMap::new();
        for element in self.root.descendants() {
            if element.name != "terminologyAssociation" {
                continue;
            }
            let concept_id = element.attr_or_empty("conceptId");
            if concept_id.is_empty() || map.contains_key(concept_id) {
                continue;
            }
            map.insert(
                concept_id.to_string(),
                TerminologyAssociation {
                    code: element.attr_or_empty("code").to_string(),
                    code_system_id: element.attr_or_empty("codeSystem").to_string(),
                    display_name: element.attr_or_empty("displayName").to_string(),
                    code_system_name: element.attr_or_empty("codeSystemName").to_string(),
                },
            );
        }
        map
    }
}

fn find_concept<'a>(element: &'a XmlElement, id: &str) -> Option<&'a XmlElement> {
    for child in &element.children {
        // Value domains and value sets hold codelist entries that reuse the
        // concept element name; those are not addressable dataset concepts.
        if child.name == "valueDomain" || child.name == "valueSet" {
            continue;
        }
        if child.name == "concept" && child.attr("id") == Some(id) {
            return Some(child);
        }
        if let Some(found) = find_concept(child, id) {
            return Some(found);
        }
    }
    None
}

/// True when a concept's status allows it into the build.
pub fn has_valid_status(concept: &XmlElement) -> bool {
    match concept.attr("statusCode") {
        Some(status) => VALID_STATUS.contains(&status.to_lowercase().as_str()),
        // Concepts without a status inherit validity from the export.
        None => true,
    }
}

/// Language-specific text of a named child element, with fallback to the
/// first child of that name when the exact language is missing.
pub fn text_in(element: &XmlElement, child_name: &str, language: &str) -> String {
    let mut first = None;
    for child in element.children_named(child_name) {
        if child.attr("language") == Some(language) {
            return child.trimmed_text().to_string();
        }
        if first.is_none() {
            first = Some(child);
        }
    }
    first.map(|c| c.trimmed_text().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <dataset id="1.2.3.10" statusCode="final">
            <name language="en-US">Cardiology</name>
            <name language="nl-NL">Cardiologie</name>
            <terminologyAssociation conceptId="1.2.3.10.1" code="301095005"
                codeSystem="2.16.840.1.113883.6.96" displayName="Cardiac finding"
                codeSystemName="SNOMED CT"/>
            <concept id="1.2.3.10.1" type="group" statusCode="final">
                <name language="en-US">Findings</name>
                <concept id="1.2.3.10.2" type="item" statusCode="deprecated">
                    <name language="en-US">Old item</name>
                </concept>
            </concept>
        </dataset>"#;

    #[test]
    fn language_lookup_with_fallback() {
        let doc = DatasetDocument::parse(DOC).expect("parse");
        assert_eq!(doc.name_in("nl-NL"), "Cardiologie");
        assert_eq!(doc.name_in("de-DE"), "Cardiology");
    }

    #[test]
    fn concept_query_finds_nested_concepts() {
        let doc = DatasetDocument::parse(DOC).expect("parse");
        assert!(doc.concept_by_id("1.2.3.10.2").is_some());
        assert!(doc.concept_by_id("9.9.9").is_none());
    }

    #[test]
    fn concept_query_skips_codelist_entries() {
        let text = r#"
            <dataset id="1">
                <concept id="2" type="item" statusCode="final">
                    <valueDomain type="code">
                        <conceptList><concept id="3"/></conceptList>
                    </valueDomain>
                </concept>
            </dataset>"#;
        let doc = DatasetDocument::parse(text).expect("parse");
        assert!(doc.concept_by_id("3").is_none());
    }

    #[test]
    fn association_scan_is_document_wide() {
        let doc = DatasetDocument::parse(DOC).expect("parse");
        let associations = doc.terminology_associations();
        let assoc = associations.get("1.2.3.10.1").expect("association");
        assert_eq!(assoc.code, "301095005");
        assert_eq!(assoc.code_system_name, "SNOMED CT");

        let systems = doc.code_system_names();
        assert_eq!(
            systems.get("2.16.840.1.113883.6.96").map(String::as_str),
            Some("SNOMED CT")
        );
    }

    #[test]
    fn status_filter() {
        let doc = DatasetDocument::parse(DOC).expect("parse");
        let group = doc.concept_by_id("1.2.3.10.1").expect("group");
        assert!(has_valid_status(group));
        let deprecated = doc.concept_by_id("1.2.3.10.2").expect("item");
        assert!(!has_valid_status(deprecated));
    }
}
