//! Leaf construction for archetype elements.
//!
//! An ELEMENT's `value` attribute may carry several alternative constraints
//! (paired coded/free-text alternatives); each becomes a sibling leaf with
//! a `_v<n>` suffix. `null_flavour` constraints are built into temporary
//! leaves whose codelists are folded into every value leaf. The concrete
//! value type drives behavior through the closed [`LeafKind`] dispatch;
//! an unrecognized type degrades to a string leaf with a warning.

use tracing::warn;

use codebook_ingest::{CComplexObject, CObject, CTerminologyCode, Interval};
use codebook_model::{BoundOperator, CodeListEntry, CodebookTree, DataType, Item, NodeId, NodeKind};
use codebook_registry::ArchetypeRecord;

use super::{AdlBuilder, duration, format_magnitude};
use crate::issues::{BuildIssue, IssueKind};

/// Codesystem recorded for codes that have no external term binding.
pub(crate) const LOCAL_TERMINOLOGY: &str = "local";

/// The known leaf value types.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LeafKind {
    CodedText,
    Text,
    Ordinal,
    Quantity,
    Count,
    Boolean,
    Duration,
    DateTime,
    Date,
    Time,
    Identifier,
    Multimedia,
    Uri,
    Interval(Box<LeafKind>),
}

impl LeafKind {
    fn from_rm_type(name: &str) -> Option<Self> {
        if let Some(inner) = name
            .strip_prefix("DV_INTERVAL<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Self::from_rm_type(inner).map(|kind| LeafKind::Interval(Box::new(kind)));
        }
        match name {
            "DV_CODED_TEXT" => Some(LeafKind::CodedText),
            "DV_TEXT" => Some(LeafKind::Text),
            "DV_ORDINAL" | "DV_SCALE" => Some(LeafKind::Ordinal),
            "DV_QUANTITY" => Some(LeafKind::Quantity),
            "DV_COUNT" => Some(LeafKind::Count),
            "DV_BOOLEAN" => Some(LeafKind::Boolean),
            "DV_DURATION" => Some(LeafKind::Duration),
            "DV_DATE_TIME" => Some(LeafKind::DateTime),
            "DV_DATE" => Some(LeafKind::Date),
            "DV_TIME" => Some(LeafKind::Time),
            "DV_IDENTIFIER" => Some(LeafKind::Identifier),
            "DV_MULTIMEDIA" => Some(LeafKind::Multimedia),
            "DV_URI" | "DV_EHR_URI" => Some(LeafKind::Uri),
            _ => None,
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            LeafKind::CodedText | LeafKind::Ordinal => DataType::Code,
            LeafKind::Text | LeafKind::Multimedia | LeafKind::Uri => DataType::String,
            LeafKind::Quantity => DataType::Quantity,
            LeafKind::Count => DataType::Count,
            LeafKind::Boolean => DataType::Boolean,
            LeafKind::Duration => DataType::Duration,
            LeafKind::DateTime | LeafKind::Date | LeafKind::Time => DataType::Date,
            LeafKind::Identifier => DataType::Identifier,
            LeafKind::Interval(inner) => inner.data_type(),
        }
    }
}

impl AdlBuilder<'_> {
    /// Build the leaves of one ELEMENT and attach them.
    pub(crate) fn build_element(
        &mut self,
        tree: &mut CodebookTree,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        parent: NodeId,
    ) {
        let flavours = self.null_flavour_items(record, element);

        let values: Vec<&CObject> = element
            .attribute("value")
            .map(|a| a.children.iter().collect())
            .unwrap_or_default();

        if values.is_empty() {
            // No value constraint: an open element, captured as free text.
            let mut item = self.leaf_item(record, element, None);
            for flavour in &flavours {
                item.merge_code_list(flavour);
            }
            tree.attach(item, parent);
            return;
        }

        let multiple = values.len() > 1;
        for (index, value) in values.iter().enumerate() {
            let suffix = if multiple {
                Some(format!("_v{}", index + 1))
            } else {
                None
            };
            for mut item in self.value_leaves(record, element, value, suffix.as_deref()) {
                for flavour in &flavours {
                    item.merge_code_list(flavour);
                }
                tree.attach(item, parent);
            }
        }
    }

    /// Temporary leaves for the `null_flavour` constraints; never attached,
    /// only their codelists survive (merged into the value leaves).
    fn null_flavour_items(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
    ) -> Vec<Item> {
        let Some(attribute) = element.attribute("null_flavour") else {
            return Vec::new();
        };
        let mut items = Vec::new();
        for child in &attribute.children {
            items.extend(self.value_leaves(record, element, child, None));
        }
        items
    }

    fn leaf_item(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        suffix: Option<&str>,
    ) -> Item {
        let source_id = match suffix {
            Some(suffix) => format!("{}{suffix}", element.node_id),
            None => element.node_id.clone(),
        };
        let mut item = Item::new(
            self.ids.next(&source_id),
            NodeKind::Leaf,
            record.term_text(&self.language, &element.node_id),
        );
        item.description = record.term_description(&self.language, &element.node_id);
        item
    }

    /// Leaves for one value alternative. Usually one; interval constraints
    /// split into a `_interval_from`/`_interval_to` pair, and a fatally
    /// broken constraint yields none (issue recorded, siblings unaffected).
    fn value_leaves(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        value: &CObject,
        suffix: Option<&str>,
    ) -> Vec<Item> {
        match value {
            CObject::Complex(complex) => match LeafKind::from_rm_type(&complex.rm_type_name) {
                Some(LeafKind::Interval(inner)) => {
                    self.interval_leaves(record, element, complex, &inner, suffix)
                }
                Some(kind) => self
                    .typed_leaf(record, element, complex, &kind, suffix)
                    .into_iter()
                    .collect(),
                None => {
                    warn!(
                        rm_type = %complex.rm_type_name,
                        element = %element.node_id,
                        "unknown leaf type, degrading to string"
                    );
                    let item = self.leaf_item(record, element, suffix);
                    self.issues.push(BuildIssue {
                        item_id: item.id.clone(),
                        kind: IssueKind::UnknownLeafType,
                        message: format!("unknown value type {}", complex.rm_type_name),
                    });
                    vec![item]
                }
            },
            // Primitive constraints directly below `value`.
            CObject::TerminologyCode(code) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::Code;
                self.resolve_coded(&mut item, record, code);
                vec![item]
            }
            CObject::Duration(constraint) => self
                .duration_leaf(record, element, constraint.constraint.as_deref(), suffix)
                .into_iter()
                .collect(),
            CObject::Boolean(_) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::Boolean;
                vec![item]
            }
            CObject::Integer(constraint) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::Integer;
                if let Some(range) = &constraint.range {
                    apply_integer_interval(&mut item, range);
                }
                vec![item]
            }
            CObject::Str(_) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::String;
                vec![item]
            }
            CObject::Date(_) | CObject::DateTime(_) | CObject::Time(_) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::Date;
                vec![item]
            }
            CObject::Real(constraint) => {
                let mut item = self.leaf_item(record, element, suffix);
                item.data_type = DataType::Quantity;
                if let Some(range) = &constraint.range {
                    apply_real_interval(&mut item, range);
                }
                vec![item]
            }
            other => {
                warn!(element = %element.node_id, "unsupported value constraint, degrading to string");
                let item = self.leaf_item(record, element, suffix);
                self.issues.push(BuildIssue {
                    item_id: item.id.clone(),
                    kind: IssueKind::UnknownLeafType,
                    message: format!("unsupported value constraint at {}", other.node_id()),
                });
                vec![item]
            }
        }
    }

    fn typed_leaf(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        complex: &CComplexObject,
        kind: &LeafKind,
        suffix: Option<&str>,
    ) -> Option<Item> {
        if matches!(kind, LeafKind::Duration) {
            let constraint = complex
                .attribute("value")
                .and_then(|a| a.children.first())
                .and_then(|child| match child {
                    CObject::Duration(d) => d.constraint.as_deref(),
                    _ => None,
                });
            return self.duration_leaf(record, element, constraint, suffix);
        }

        let mut item = self.leaf_item(record, element, suffix);
        item.data_type = kind.data_type();
        match kind {
            LeafKind::CodedText => {
                if let Some(code) = terminology_code_in(complex, "defining_code") {
                    self.resolve_coded(&mut item, record, code);
                }
            }
            LeafKind::Ordinal => {
                if let Some(code) = terminology_code_in(complex, "symbol") {
                    self.resolve_coded(&mut item, record, code);
                }
            }
            LeafKind::Quantity => self.apply_quantity(&mut item, record, complex),
            LeafKind::Count => {
                if let Some(attribute) = complex.attribute("magnitude")
                    && let Some(CObject::Integer(constraint)) = attribute.children.first()
                    && let Some(range) = &constraint.range
                {
                    apply_integer_interval(&mut item, range);
                }
            }
            // The remaining kinds carry the data type tag and nothing else.
            _ => {}
        }
        Some(item)
    }

    /// A duration leaf. A constraint that exists but does not parse is
    /// fatal for this one leaf: the issue is recorded and no leaf is
    /// produced, so the surrounding group still builds.
    fn duration_leaf(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        constraint: Option<&str>,
        suffix: Option<&str>,
    ) -> Option<Item> {
        let mut item = self.leaf_item(record, element, suffix);
        item.data_type = DataType::Duration;
        let Some(text) = constraint else {
            return Some(item);
        };
        match duration::parse_constraint(text) {
            Ok(bounds) => {
                item.units = bounds.units;
                item.min = bounds.min;
                item.min_operator = bounds.min_operator;
                item.max = bounds.max;
                item.max_operator = bounds.max_operator;
                Some(item)
            }
            Err(message) => {
                warn!(element = %element.node_id, constraint = text, "unparsable duration constraint");
                self.issues.push(BuildIssue {
                    item_id: item.id.clone(),
                    kind: IssueKind::UnparsableConstraint,
                    message: format!("duration constraint {text:?} did not parse: {message}"),
                });
                None
            }
        }
    }

    /// Split a `DV_INTERVAL<X>` into `_interval_from`/`_interval_to`
    /// leaves. A missing side becomes a unit-only placeholder so exporters
    /// still see a consistent pair.
    fn interval_leaves(
        &mut self,
        record: &ArchetypeRecord,
        element: &CComplexObject,
        complex: &CComplexObject,
        inner: &LeafKind,
        suffix: Option<&str>,
    ) -> Vec<Item> {
        let base = suffix.unwrap_or("");
        let mut items = Vec::new();
        let mut inferred_units = String::new();
        let mut skipped: Vec<String> = Vec::new();

        for (attribute_name, side) in [("lower", "_interval_from"), ("upper", "_interval_to")] {
            let side_suffix = format!("{base}{side}");
            let bound = complex
                .attribute(attribute_name)
                .and_then(|a| a.children.first());
            match bound {
                Some(CObject::Complex(bound_complex)) => {
                    if let Some(built) = self.typed_leaf(
                        record,
                        element,
                        bound_complex,
                        inner,
                        Some(&side_suffix),
                    ) {
                        if !built.units.is_empty() {
                            inferred_units = built.units.clone();
                        }
                        items.push(built);
                    }
                }
                _ => skipped.push(side_suffix),
            }
        }

        // Placeholders for the missing sides, typed like the present one.
        for side_suffix in skipped {
            let mut item = self.leaf_item(record, element, Some(&side_suffix));
            item.data_type = inner.data_type();
            item.units = inferred_units.clone();
            items.push(item);
        }
        items
    }

    /// Per-attribute dispatch of a quantity constraint.
    fn apply_quantity(
        &mut self,
        item: &mut Item,
        record: &ArchetypeRecord,
        complex: &CComplexObject,
    ) {
        for attribute in &complex.attributes {
            match attribute.rm_attribute_name.as_str() {
                // The measured property is descriptive text, not a field.
                "property" => {
                    if let Some(CObject::TerminologyCode(code)) = attribute.children.first()
                        && let Some(first) = code.constraint.first()
                    {
                        let text = record.term_text(&self.language, first);
                        if item.description.is_empty() {
                            item.description = text;
                        } else {
                            item.description = format!("{} ({text})", item.description);
                        }
                    }
                }
                "magnitude" => {
                    if let Some(CObject::Real(constraint)) = attribute.children.first()
                        && let Some(range) = &constraint.range
                    {
                        apply_real_interval(item, range);
                    }
                }
                "units" => {
                    if let Some(CObject::Str(constraint)) = attribute.children.first()
                        && let Some(first) = constraint.list.first()
                    {
                        item.units = first.clone();
                    }
                }
                "precision" => {
                    if let Some(CObject::Integer(constraint)) = attribute.children.first()
                        && let Some(range) = &constraint.range
                        && let Some(lower) = range.lower
                    {
                        item.precision = lower.to_string();
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve a terminology-code constraint into codelist entries.
    ///
    /// An ac-code expands to every member of the named value set. Each
    /// resolved code takes its text/description from the local term
    /// definitions and its codesystem from the term bindings when one
    /// exists; otherwise it is recorded against the local sentinel.
    pub(crate) fn resolve_coded(
        &mut self,
        item: &mut Item,
        record: &ArchetypeRecord,
        constraint: &CTerminologyCode,
    ) {
        let mut codes: Vec<String> = Vec::new();
        for code in &constraint.constraint {
            if code.starts_with("ac") {
                match record.value_set(code) {
                    Some(value_set) => codes.extend(value_set.members.iter().cloned()),
                    None => warn!(code = %code, archetype = record.id(), "value set not declared"),
                }
            } else {
                codes.push(code.clone());
            }
        }

        for code in codes {
            let value = record.term_text(&self.language, &code);
            let description = record.term_description(&self.language, &code);
            match record.binding_for(&code) {
                Some(binding) => item.push_code(CodeListEntry {
                    code: binding.code,
                    value,
                    code_system: binding.terminology,
                    description,
                }),
                None => item.push_code(CodeListEntry {
                    code,
                    value,
                    code_system: LOCAL_TERMINOLOGY.to_string(),
                    description,
                }),
            }
        }
    }
}

/// First terminology-code constraint under the named attribute, however
/// deeply the RM nests it (ordinals keep it inside their symbol's
/// defining_code).
fn terminology_code_in<'o>(
    complex: &'o CComplexObject,
    attribute: &str,
) -> Option<&'o CTerminologyCode> {
    let attribute = complex.attribute(attribute)?;
    find_terminology_code(&attribute.children)
}

fn find_terminology_code(children: &[CObject]) -> Option<&CTerminologyCode> {
    for child in children {
        match child {
            CObject::TerminologyCode(code) => return Some(code),
            CObject::Complex(complex) => {
                for attribute in &complex.attributes {
                    if let Some(found) = find_terminology_code(&attribute.children) {
                        return Some(found);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn apply_real_interval(item: &mut Item, interval: &Interval<f64>) {
    if let Some(lower) = interval.lower
        && !interval.lower_unbounded
    {
        item.min = format_magnitude(lower);
        item.min_operator = if interval.lower_included {
            BoundOperator::Ge
        } else {
            BoundOperator::Gt
        };
    }
    if let Some(upper) = interval.upper
        && !interval.upper_unbounded
    {
        item.max = format_magnitude(upper);
        item.max_operator = if interval.upper_included {
            BoundOperator::Le
        } else {
            BoundOperator::Lt
        };
    }
}

fn apply_integer_interval(item: &mut Item, interval: &Interval<i64>) {
    if let Some(lower) = interval.lower
        && !interval.lower_unbounded
    {
        item.min = lower.to_string();
        item.min_operator = if interval.lower_included {
            BoundOperator::Ge
        } else {
            BoundOperator::Gt
        };
    }
    if let Some(upper) = interval.upper
        && !interval.upper_unbounded
    {
        item.max = upper.to_string();
        item.max_operator = if interval.upper_included {
            BoundOperator::Le
        } else {
            BoundOperator::Lt
        };
    }
}
