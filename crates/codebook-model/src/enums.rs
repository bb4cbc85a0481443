//! Type-safe enumerations for the unified codebook model.
//!
//! Source formats carry these concepts as free strings (DECOR value-domain
//! `type` attributes, openEHR `rm_type_name`s). The enums pin them down so
//! a missing case is a compile-time gap instead of a silent string mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a node in the normalized tree.
///
/// Fixed at construction; a node never changes kind afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// Branching node with no value of its own. May still carry a codelist:
    /// some codebooks treat group-like concepts as selectable items.
    Group,

    /// Selectable field.
    Leaf,

    /// Non-selectable informational leaf, e.g. a placeholder for a
    /// reference that could not be resolved.
    LeafInfo,
}

impl NodeKind {
    /// Canonical lowercase label, used in rendered trees and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Leaf => "leaf",
            NodeKind::LeafInfo => "leaf-info",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value data type of an item.
///
/// The closed vocabulary shared by both source formats. DECOR value-domain
/// types and openEHR DV types both normalize into this set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Coded value picked from a codelist.
    Code,
    /// Whole number without interval semantics.
    Integer,
    /// Counted amount, bounded by an interval constraint.
    Count,
    /// Measured amount with units and optional bounds.
    Quantity,
    /// Yes/no.
    Boolean,
    /// Time span with a unit (ISO-8601 style constraint upstream).
    Duration,
    /// Calendar date or date-time.
    Date,
    /// Free text. Also the degraded type for anything unrecognized.
    #[default]
    String,
    /// External identifier (patient number, accession number, ...).
    Identifier,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Code => "code",
            DataType::Integer => "integer",
            DataType::Count => "count",
            DataType::Quantity => "quantity",
            DataType::Boolean => "boolean",
            DataType::Duration => "duration",
            DataType::Date => "date",
            DataType::String => "string",
            DataType::Identifier => "identifier",
        }
    }

    /// True when units/min/max/precision carry meaning for this type.
    pub fn has_magnitude(&self) -> bool {
        matches!(
            self,
            DataType::Quantity | DataType::Count | DataType::Duration
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    /// Parse a source-format type label into a `DataType`.
    ///
    /// Accepts the DECOR value-domain vocabulary including its aliases
    /// (`ordinal` is a coded pick, `decimal` a quantity, `datetime` a date).
    /// Unknown labels are an error here; builders decide whether to degrade
    /// to `String` instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" | "ordinal" => Ok(DataType::Code),
            "integer" => Ok(DataType::Integer),
            "count" => Ok(DataType::Count),
            "quantity" | "decimal" => Ok(DataType::Quantity),
            "boolean" => Ok(DataType::Boolean),
            "duration" => Ok(DataType::Duration),
            "date" | "datetime" => Ok(DataType::Date),
            "string" | "text" => Ok(DataType::String),
            "identifier" => Ok(DataType::Identifier),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

/// Comparison operator attached to a minimum or maximum bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundOperator {
    /// No bound present.
    #[default]
    None,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Exactly equal.
    Eq,
}

impl BoundOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundOperator::None => "",
            BoundOperator::Lt => "<",
            BoundOperator::Le => "<=",
            BoundOperator::Gt => ">",
            BoundOperator::Ge => ">=",
            BoundOperator::Eq => "=",
        }
    }
}

impl fmt::Display for BoundOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether every code in a codelist parses as an integer.
///
/// Derived incrementally while entries are added; drives the dual-mode
/// codelist sort and tells exporters how to type the code column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeDataType {
    /// All codes so far parse as i64. The state of an empty codelist.
    #[default]
    Integer,
    /// At least one code does not parse as an integer.
    String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_aliases_parse() {
        assert_eq!("ordinal".parse::<DataType>().unwrap(), DataType::Code);
        assert_eq!("decimal".parse::<DataType>().unwrap(), DataType::Quantity);
        assert_eq!("DateTime".parse::<DataType>().unwrap(), DataType::Date);
        assert!("blob".parse::<DataType>().is_err());
    }

    #[test]
    fn magnitude_types() {
        assert!(DataType::Quantity.has_magnitude());
        assert!(DataType::Duration.has_magnitude());
        assert!(!DataType::Code.has_magnitude());
    }

    #[test]
    fn operator_labels() {
        assert_eq!(BoundOperator::Ge.as_str(), ">=");
        assert_eq!(BoundOperator::None.as_str(), "");
    }
}
