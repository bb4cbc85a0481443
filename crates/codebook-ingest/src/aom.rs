//! Flattened archetype object model.
//!
//! Archetypes arrive flattened (specialization already merged by the fetch
//! collaborator) in their canonical JSON serialization. The constraint
//! classes form a closed tagged enum so an unhandled class is a visible
//! compile-time gap rather than a stringly-typed surprise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

fn default_true() -> bool {
    true
}

/// Interval constraint with per-bound inclusivity, as serialized for
/// magnitude and precision constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    #[serde(default)]
    pub lower: Option<T>,
    #[serde(default)]
    pub upper: Option<T>,
    #[serde(default = "default_true")]
    pub lower_included: bool,
    #[serde(default = "default_true")]
    pub upper_included: bool,
    #[serde(default)]
    pub lower_unbounded: bool,
    #[serde(default)]
    pub upper_unbounded: bool,
}

/// One constraint object in the definition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum CObject {
    #[serde(rename = "C_COMPLEX_OBJECT")]
    Complex(CComplexObject),
    /// use_node: a reference to a shared subtree elsewhere in the same
    /// archetype, addressed by path.
    #[serde(rename = "C_COMPLEX_OBJECT_PROXY")]
    Proxy(CComplexObjectProxy),
    /// A point where another archetype may be plugged in.
    #[serde(rename = "ARCHETYPE_SLOT")]
    Slot(ArchetypeSlot),
    #[serde(rename = "C_TERMINOLOGY_CODE")]
    TerminologyCode(CTerminologyCode),
    #[serde(rename = "C_STRING")]
    Str(CString),
    #[serde(rename = "C_BOOLEAN")]
    Boolean(CBoolean),
    #[serde(rename = "C_INTEGER")]
    Integer(CInteger),
    #[serde(rename = "C_REAL")]
    Real(CReal),
    #[serde(rename = "C_DURATION")]
    Duration(CDuration),
    #[serde(rename = "C_DATE")]
    Date(CDate),
    #[serde(rename = "C_DATE_TIME")]
    DateTime(CDateTime),
    #[serde(rename = "C_TIME")]
    Time(CTime),
}

impl CObject {
    /// The at-code of the object, empty for primitives.
    pub fn node_id(&self) -> &str {
        match self {
            CObject::Complex(c) => &c.node_id,
            CObject::Proxy(p) => &p.node_id,
            CObject::Slot(s) => &s.node_id,
            _ => "",
        }
    }

    pub fn as_complex(&self) -> Option<&CComplexObject> {
        match self {
            CObject::Complex(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CComplexObject {
    pub rm_type_name: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub attributes: Vec<CAttribute>,
}

impl CComplexObject {
    /// Attribute by RM name.
    pub fn attribute(&self, name: &str) -> Option<&CAttribute> {
        self.attributes
            .iter()
            .find(|a| a.rm_attribute_name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CAttribute {
    pub rm_attribute_name: String,
    #[serde(default)]
    pub children: Vec<CObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CComplexObjectProxy {
    pub rm_type_name: String,
    #[serde(default)]
    pub node_id: String,
    pub target_path: String,
}

/// Inclusion/exclusion assertion of a slot, in expression text form, e.g.
/// `archetype_id/value matches {/openEHR-EHR-CLUSTER\.address\.v1/}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(default)]
    pub string_expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeSlot {
    pub rm_type_name: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub includes: Vec<Assertion>,
    #[serde(default)]
    pub excludes: Vec<Assertion>,
}

/// Local at-codes, or a single ac-code naming a value set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CTerminologyCode {
    #[serde(default)]
    pub constraint: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CString {
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CBoolean {
    #[serde(default = "default_true")]
    pub true_valid: bool,
    #[serde(default = "default_true")]
    pub false_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CInteger {
    #[serde(default)]
    pub list: Vec<i64>,
    #[serde(default)]
    pub range: Option<Interval<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CReal {
    #[serde(default)]
    pub list: Vec<f64>,
    #[serde(default)]
    pub range: Option<Interval<f64>>,
}

/// Duration constraints keep the ADL text form (`PT0S..PT12H`, `>=P1M`);
/// builders parse it because the interesting part is unit granularity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CDuration {
    #[serde(default)]
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CDate {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CDateTime {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CTime {
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Text and description of one local term, per language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTerm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// The archetype's terminology section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTerminology {
    /// language -> code -> term.
    #[serde(default)]
    pub term_definitions: BTreeMap<String, BTreeMap<String, ArchetypeTerm>>,
    /// terminology name -> local code -> URI.
    #[serde(default)]
    pub term_bindings: BTreeMap<String, BTreeMap<String, String>>,
    /// ac-code -> member at-codes.
    #[serde(default)]
    pub value_sets: BTreeMap<String, ValueSet>,
}

/// A flattened archetype as delivered by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub archetype_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub definition: CObject,
    #[serde(default)]
    pub terminology: ArchetypeTerminology,
}

impl Archetype {
    /// Parse the canonical JSON form.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| IngestError::Json {
            name: name.to_string(),
            source,
        })
    }

    /// Declared version, falling back to the trailing `.vN` of the id.
    pub fn version(&self) -> &str {
        if let Some(version) = &self.version {
            return version;
        }
        match self.archetype_id.rsplit_once(".v") {
            Some((_, tail)) if tail.chars().all(|c| c.is_ascii_digit()) => {
                &self.archetype_id[self.archetype_id.len() - tail.len() - 1..]
            }
            _ => "",
        }
    }

    /// Resolve a use-node target path (`/data[at0001]/events[at0002]/data`)
    /// from the definition root.
    pub fn resolve_path(&self, path: &str) -> Option<&CObject> {
        let mut current = &self.definition;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (attribute_name, node_id) = match segment.split_once('[') {
                Some((name, rest)) => (name, rest.strip_suffix(']').unwrap_or(rest)),
                None => (segment, ""),
            };
            let attribute = current.as_complex()?.attribute(attribute_name)?;
            current = if node_id.is_empty() {
                attribute.children.first()?
            } else {
                attribute.children.iter().find(|c| c.node_id() == node_id)?
            };
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHETYPE: &str = r#"{
        "archetype_id": "openEHR-EHR-OBSERVATION.body_weight.v2",
        "original_language": "en",
        "languages": ["en", "nl"],
        "definition": {
            "_type": "C_COMPLEX_OBJECT",
            "rm_type_name": "OBSERVATION",
            "node_id": "at0000",
            "attributes": [
                {
                    "rm_attribute_name": "data",
                    "children": [
                        {
                            "_type": "C_COMPLEX_OBJECT",
                            "rm_type_name": "HISTORY",
                            "node_id": "at0002",
                            "attributes": [
                                {
                                    "rm_attribute_name": "events",
                                    "children": [
                                        {
                                            "_type": "C_COMPLEX_OBJECT",
                                            "rm_type_name": "EVENT",
                                            "node_id": "at0003",
                                            "attributes": []
                                        }
                                    ]
                                }
                            ]
                        }
                    ]
                }
            ]
        },
        "terminology": {
            "term_definitions": {
                "en": {
                    "at0003": {"text": "Any event", "description": "Any point-in-time event."}
                }
            },
            "term_bindings": {
                "SNOMED-CT": {"at0003": "http://snomed.info/id/27113001"}
            },
            "value_sets": {
                "ac1": {"id": "ac1", "members": ["at0005", "at0006"]}
            }
        }
    }"#;

    #[test]
    fn parses_canonical_json() {
        let archetype = Archetype::parse("body_weight", ARCHETYPE).expect("parse");
        assert_eq!(archetype.archetype_id, "openEHR-EHR-OBSERVATION.body_weight.v2");
        assert_eq!(archetype.version(), "v2");
        let root = archetype.definition.as_complex().expect("complex root");
        assert_eq!(root.rm_type_name, "OBSERVATION");
    }

    #[test]
    fn resolves_paths_with_and_without_node_ids() {
        let archetype = Archetype::parse("body_weight", ARCHETYPE).expect("parse");
        let event = archetype
            .resolve_path("/data[at0002]/events[at0003]")
            .expect("event by node id");
        assert_eq!(event.node_id(), "at0003");

        let history = archetype.resolve_path("/data").expect("first child");
        assert_eq!(history.node_id(), "at0002");

        assert!(archetype.resolve_path("/data[at0099]").is_none());
    }

    #[test]
    fn unknown_constraint_class_is_a_parse_error() {
        let bad = r#"{
            "archetype_id": "openEHR-EHR-CLUSTER.x.v1",
            "definition": {"_type": "C_MYSTERY", "rm_type_name": "CLUSTER"}
        }"#;
        assert!(Archetype::parse("x", bad).is_err());
    }

    #[test]
    fn interval_defaults_are_inclusive() {
        let interval: Interval<f64> =
            serde_json::from_str(r#"{"lower": 0.0, "upper": 20.0}"#).expect("interval");
        assert!(interval.lower_included);
        assert!(interval.upper_included);
        assert!(!interval.lower_unbounded);
    }
}
