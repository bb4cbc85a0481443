//! Leaf item construction for dataset-export XML.
//!
//! Codelists come from two competing places in the source: a codelist
//! under the value domain, or one under an associated value set. When both
//! exist the value-domain list wins; this matches the source documents as
//! published and is deliberately not "fixed" here.

use tracing::warn;

use codebook_ingest::{TerminologyAssociation, XmlElement, text_in};
use codebook_model::{BoundOperator, CodeListEntry, DataType, Item, NodeKind, OntologyBinding};

use super::{DecorBuilder, DocContext};
use crate::issues::{BuildIssue, IssueKind};

/// A codelist entry before synthetic codes are assigned.
struct RawEntry {
    code: String,
    value: String,
    code_system: String,
    description: String,
}

pub(crate) fn binding_from(
    association: &TerminologyAssociation,
    context: &DocContext,
) -> OntologyBinding {
    let code_system = if association.code_system_name.is_empty() {
        context.code_system_name(&association.code_system_id).to_string()
    } else {
        association.code_system_name.clone()
    };
    OntologyBinding {
        code: association.code.clone(),
        code_system,
        description: association.display_name.clone(),
    }
}

impl DecorBuilder<'_> {
    /// Build one selectable leaf from an item concept.
    pub(crate) fn build_leaf(&mut self, concept: &XmlElement, context: &DocContext) -> Item {
        let source_id = concept.attr_or_empty("id");
        let language = self.language.clone();
        let mut item = Item::new(
            self.ids.next(source_id),
            NodeKind::Leaf,
            text_in(concept, "name", &language),
        );
        item.description = text_in(concept, "desc", &language);

        for property in concept.children_named("property") {
            if let Some(name) = property.attr("name") {
                item.properties
                    .insert(name.to_string(), property.trimmed_text().to_string());
            }
        }

        if let Some(association) = context.association(source_id) {
            item.ontology = Some(binding_from(association, context));
        }

        if let Some(value_domain) = concept.child("valueDomain") {
            item.data_type = value_domain
                .attr_or_empty("type")
                .parse()
                .unwrap_or(DataType::String);
            if item.data_type == DataType::Quantity {
                apply_quantity_property(&mut item, value_domain);
            }
        }

        if let Err(message) = self.assemble_code_list(&mut item, concept, context) {
            warn!(item = %item.id, message = %message, "malformed codelist, clearing");
            item.mark_code_list_broken();
            self.issues.push(BuildIssue {
                item_id: item.id.clone(),
                kind: IssueKind::BrokenCodeList,
                message,
            });
        }

        item.sort_code_list();
        item
    }

    fn assemble_code_list(
        &mut self,
        item: &mut Item,
        concept: &XmlElement,
        context: &DocContext,
    ) -> Result<(), String> {
        let domain_list = concept
            .child("valueDomain")
            .and_then(|vd| vd.child("conceptList"));
        let set_list = concept
            .child("valueSet")
            .and_then(|vs| vs.child("conceptList"));

        // When both lists exist, the value-domain one wins. Observed
        // asymmetry in published datasets; kept as-is.
        if let Some(list) = domain_list {
            let raw = self.domain_entries(list, context)?;
            finalize(item, raw);
        } else if let Some(list) = set_list {
            let raw = set_entries(list, context)?;
            finalize(item, raw);
            self.fold_exceptions(item, list, context);
        }
        Ok(())
    }

    /// Entries of a value-domain codelist. Codes come from the
    /// terminology-association map keyed by the entry's own concept id.
    fn domain_entries(
        &self,
        list: &XmlElement,
        context: &DocContext,
    ) -> Result<Vec<RawEntry>, String> {
        let mut raw = Vec::new();
        for entry in list.children_named("concept") {
            let entry_id = entry
                .attr("id")
                .ok_or_else(|| "codelist entry without id".to_string())?;
            let value = text_in(entry, "name", &self.language);
            match context.association(entry_id) {
                Some(association) => {
                    let code_system = if association.code_system_name.is_empty() {
                        context
                            .code_system_name(&association.code_system_id)
                            .to_string()
                    } else {
                        association.code_system_name.clone()
                    };
                    raw.push(RawEntry {
                        code: association.code.clone(),
                        value,
                        code_system,
                        description: association.display_name.clone(),
                    });
                }
                // No association: the code stays blank and is assigned a
                // synthetic one during finalization.
                None => raw.push(RawEntry {
                    code: String::new(),
                    value,
                    code_system: String::new(),
                    description: String::new(),
                }),
            }
        }
        Ok(raw)
    }

    /// Fold value-set `exception` entries (null flavours) in after the
    /// normal entries, through the documented codelist merge.
    fn fold_exceptions(&self, item: &mut Item, list: &XmlElement, context: &DocContext) {
        let exceptions: Vec<&XmlElement> = list.children_named("exception").collect();
        if exceptions.is_empty() {
            return;
        }
        let mut flavours = Item::new(format!("{}_flavours", item.id), NodeKind::Leaf, "");
        for exception in exceptions {
            let system_id = exception.attr_or_empty("codeSystem");
            flavours.push_code(CodeListEntry {
                code: exception.attr_or_empty("code").to_string(),
                value: exception.attr_or_empty("displayName").to_string(),
                code_system: context.code_system_name(system_id).to_string(),
                description: text_in(exception, "desc", &self.language),
            });
        }
        item.merge_code_list(&flavours);
    }
}

/// Entries of a value-set codelist; code and display name sit directly on
/// the entry element.
fn set_entries(list: &XmlElement, context: &DocContext) -> Result<Vec<RawEntry>, String> {
    let mut raw = Vec::new();
    for entry in list.children_named("concept") {
        let code = entry.attr_or_empty("code");
        let value = entry.attr_or_empty("displayName");
        if code.is_empty() && value.is_empty() {
            return Err("value-set entry without code or display name".to_string());
        }
        let system_id = entry.attr_or_empty("codeSystem");
        raw.push(RawEntry {
            code: code.to_string(),
            value: value.to_string(),
            code_system: context.code_system_name(system_id).to_string(),
            description: String::new(),
        });
    }
    Ok(raw)
}

/// Second phase of codelist assembly: entries with a blank code get
/// synthetic `Code_<n>` codes, 1-based in encounter order. Assigning them
/// only after the whole list is known avoids colliding with a genuine
/// numeric code later in the list, and any synthetic code forces the code
/// data type to string.
fn finalize(item: &mut Item, raw: Vec<RawEntry>) {
    let mut synthetic = 0;
    for entry in raw {
        let code = if entry.code.trim().is_empty() {
            synthetic += 1;
            format!("Code_{synthetic}")
        } else {
            entry.code
        };
        item.push_code(CodeListEntry {
            code,
            value: entry.value,
            code_system: entry.code_system,
            description: entry.description,
        });
    }
}

/// Units, bounds and precision of a quantity value domain. The source
/// format cannot express strict inequalities, so bounds are inclusive.
fn apply_quantity_property(item: &mut Item, value_domain: &XmlElement) {
    let Some(property) = value_domain.child("property") else {
        return;
    };
    if let Some(unit) = property.attr("unit") {
        item.units = unit.to_string();
    }
    if let Some(min) = property.attr("minInclude") {
        item.min = min.to_string();
        item.min_operator = BoundOperator::Ge;
    }
    if let Some(max) = property.attr("maxInclude") {
        item.max = max.to_string();
        item.max_operator = BoundOperator::Le;
    }
    if let Some(precision) = property.attr("fractionDigits") {
        item.precision = precision.to_string();
    }
}
