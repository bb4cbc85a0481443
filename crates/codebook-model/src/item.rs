//! The unified codebook item.
//!
//! One `Item` represents a single selectable field or group, normalized out
//! of either source format. Downstream consumers (selection UI, form
//! exporters) read only this model and never touch the source documents.
//!
//! Codelists are ordered; entry order is presentation order. Code lookups
//! are case-insensitive and fail loudly when the code is absent, since
//! presence is established during construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{BoundOperator, CodeDataType, DataType, NodeKind};
use crate::error::{ModelError, Result};

/// One selectable option in a codelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeListEntry {
    /// The code as submitted in the source, or a synthetic `Code_<n>`.
    pub code: String,
    /// Display value shown to the selecting user.
    pub value: String,
    /// Name of the codesystem the code belongs to.
    pub code_system: String,
    /// Optional longer description of the option.
    pub description: String,
}

/// Terminology identity of the item itself, independent of any codelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyBinding {
    /// Code for the concept in an external terminology.
    pub code: String,
    /// Name of that terminology.
    pub code_system: String,
    /// Display name of the code.
    pub description: String,
}

/// A single normalized codebook item.
///
/// Built once by a format builder and immutable afterwards, apart from the
/// two documented post-construction writes (`merge_code_list`,
/// `mark_code_list_broken`) that the dataset-XML builder performs while the
/// build is still running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Globally unique id: source-local id plus a build-local suffix,
    /// since source ids repeat across referenced branches.
    pub id: String,
    /// Node kind, fixed at construction.
    pub kind: NodeKind,
    /// Display name in the build language.
    pub name: String,
    /// Description in the build language.
    pub description: String,
    /// Value data type.
    pub data_type: DataType,
    /// Units label. Meaningful for quantity/count/duration only.
    pub units: String,
    /// Minimum bound, empty when absent.
    pub min: String,
    /// Operator for the minimum bound.
    pub min_operator: BoundOperator,
    /// Maximum bound, empty when absent.
    pub max: String,
    /// Operator for the maximum bound.
    pub max_operator: BoundOperator,
    /// Decimal precision, default "0".
    pub precision: String,
    /// What the item itself denotes in an external terminology.
    pub ontology: Option<OntologyBinding>,
    /// Source-specific extension properties (dataset-XML builder only).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    code_list: Vec<CodeListEntry>,
    code_data_type: CodeDataType,
}

impl Item {
    /// Create an item with the given identity and kind. Everything else
    /// starts at the documented defaults.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            description: String::new(),
            data_type: DataType::default(),
            units: String::new(),
            min: String::new(),
            min_operator: BoundOperator::None,
            max: String::new(),
            max_operator: BoundOperator::None,
            precision: "0".to_string(),
            ontology: None,
            properties: BTreeMap::new(),
            code_list: Vec::new(),
            code_data_type: CodeDataType::Integer,
        }
    }

    /// Append a codelist entry, keeping `code_data_type` current.
    ///
    /// Callers are responsible for deduplicating codes; the model does not
    /// reject duplicates.
    pub fn push_code(&mut self, entry: CodeListEntry) {
        if entry.code.trim().parse::<i64>().is_err() {
            self.code_data_type = CodeDataType::String;
        }
        self.code_list.push(entry);
    }

    /// True when the codelist has at least one entry.
    pub fn has_code_list(&self) -> bool {
        !self.code_list.is_empty()
    }

    /// The codelist in presentation order.
    pub fn code_list(&self) -> &[CodeListEntry] {
        &self.code_list
    }

    /// Whether all codes are integer-parseable.
    pub fn code_data_type(&self) -> CodeDataType {
        self.code_data_type
    }

    /// All codes, in order.
    pub fn codes(&self) -> Vec<&str> {
        self.code_list.iter().map(|e| e.code.as_str()).collect()
    }

    /// All display values, in order.
    pub fn code_values(&self) -> Vec<&str> {
        self.code_list.iter().map(|e| e.value.as_str()).collect()
    }

    /// All codesystem names, in order.
    pub fn code_systems(&self) -> Vec<&str> {
        self.code_list
            .iter()
            .map(|e| e.code_system.as_str())
            .collect()
    }

    /// All entry descriptions, in order.
    pub fn code_descriptions(&self) -> Vec<&str> {
        self.code_list
            .iter()
            .map(|e| e.description.as_str())
            .collect()
    }

    /// Whether the codelist contains `code` (case-insensitive).
    pub fn contains_code(&self, code: &str) -> bool {
        self.entry_for_code(code).is_ok()
    }

    /// Display value for a code. Errors when the code is absent.
    pub fn value_for_code(&self, code: &str) -> Result<&str> {
        self.entry_for_code(code).map(|e| e.value.as_str())
    }

    /// Description for a code. Errors when the code is absent.
    pub fn description_for_code(&self, code: &str) -> Result<&str> {
        self.entry_for_code(code).map(|e| e.description.as_str())
    }

    /// Codesystem name for a code. Errors when the code is absent.
    pub fn code_system_for_code(&self, code: &str) -> Result<&str> {
        self.entry_for_code(code).map(|e| e.code_system.as_str())
    }

    fn entry_for_code(&self, code: &str) -> Result<&CodeListEntry> {
        self.code_list
            .iter()
            .find(|e| e.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| ModelError::CodeNotFound {
                code: code.to_string(),
            })
    }

    /// Sort the codelist: ascending numeric when every code parses as an
    /// integer, case-insensitive lexical otherwise.
    ///
    /// Codebooks mix integer-coded and SNOMED/free-text-coded lists within
    /// one document; the dual mode keeps both in a stable, human-sensible
    /// order.
    pub fn sort_code_list(&mut self) {
        if self.code_data_type == CodeDataType::Integer {
            self.code_list
                .sort_by_key(|e| e.code.trim().parse::<i64>().unwrap_or(i64::MAX));
        } else {
            self.code_list
                .sort_by(|a, b| a.code.to_lowercase().cmp(&b.code.to_lowercase()));
        }
    }

    /// Fold another item's codelist into this one, skipping codes already
    /// present (case-insensitive).
    ///
    /// Documented post-construction write: the dataset-XML builder uses it
    /// to fold null-flavour branches into a sibling item.
    pub fn merge_code_list(&mut self, other: &Item) {
        for entry in &other.code_list {
            if !self.contains_code(&entry.code) {
                self.push_code(entry.clone());
            }
        }
    }

    /// Discard a malformed codelist: clear all entries, force the data type
    /// to string, and reset the code data type.
    ///
    /// Documented post-construction write, used when source codelist data
    /// turns out to be structurally broken mid-assembly.
    pub fn mark_code_list_broken(&mut self) {
        self.code_list.clear();
        self.data_type = DataType::String;
        self.code_data_type = CodeDataType::Integer;
    }
}
