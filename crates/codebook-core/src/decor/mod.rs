//! Builder for dataset-export XML codebooks.
//!
//! Recursive descent over the concept tree of a dataset document. Groups
//! become GROUP nodes, items become leaves, and `inherit` references to
//! concepts in other datasets are expanded in place as if they were local.
//! A reference chain that reaches an id already on its own path stops with
//! a placeholder instead of recursing forever; the chain is scoped per
//! branch, so sibling branches may reference the same concept
//! independently.

mod leaf;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use codebook_ingest::{
    CodebookSettings, DatasetDocument, TerminologyAssociation, XmlElement, has_valid_status,
    text_in,
};
use codebook_model::{CodebookTree, Item, NodeId, NodeKind};
use codebook_registry::Registry;

use crate::error::Result;
use crate::ids::IdAllocator;
use crate::issues::{BuildIssue, CodebookBuild, IssueKind, attach_info_leaf};

/// One source document plus its document-wide lookup tables.
///
/// Codesystem declarations and terminology associations are not scoped to
/// the subtree they sit in, so both tables are built by one upfront scan
/// per document.
pub(crate) struct DocContext {
    document: Arc<DatasetDocument>,
    code_systems: BTreeMap<String, String>,
    associations: BTreeMap<String, TerminologyAssociation>,
}

impl DocContext {
    fn new(document: Arc<DatasetDocument>) -> Self {
        let code_systems = document.code_system_names();
        let associations = document.terminology_associations();
        Self {
            document,
            code_systems,
            associations,
        }
    }

    pub(crate) fn association(&self, concept_id: &str) -> Option<&TerminologyAssociation> {
        self.associations.get(concept_id)
    }

    /// Codesystem name by id, falling back to the id itself.
    pub(crate) fn code_system_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.code_systems.get(id).map(String::as_str).unwrap_or(id)
    }
}

pub struct DecorBuilder<'a> {
    registry: &'a Registry,
    codebook: String,
    language: String,
    groups_selectable: bool,
    pub(crate) ids: IdAllocator,
    pub(crate) issues: Vec<BuildIssue>,
}

impl<'a> DecorBuilder<'a> {
    /// Build the normalized tree for one (codebook, dataset, language).
    ///
    /// A missing or unparsable entry document is fatal; everything else
    /// degrades to placeholders and issues.
    pub fn build(
        registry: &'a Registry,
        settings: &CodebookSettings,
        dataset_id: &str,
        language: &str,
    ) -> Result<CodebookBuild> {
        let document = registry.dataset(&settings.name, dataset_id, language)?;
        let mut builder = Self {
            registry,
            codebook: settings.name.clone(),
            language: language.to_string(),
            groups_selectable: settings.groups_selectable,
            ids: IdAllocator::new(),
            issues: Vec::new(),
        };
        let context = DocContext::new(document);
        let mut tree = CodebookTree::new(&settings.name);
        let root = tree.root();
        let mut chain = Vec::new();
        builder.build_children(&mut tree, context.document.dataset(), root, &context, &mut chain);
        Ok(CodebookBuild {
            tree,
            issues: builder.issues,
        })
    }

    fn build_children(
        &mut self,
        tree: &mut CodebookTree,
        element: &XmlElement,
        parent: NodeId,
        context: &DocContext,
        chain: &mut Vec<String>,
    ) {
        for concept in element.children_named("concept") {
            if !has_valid_status(concept) {
                continue;
            }
            self.build_concept(tree, concept, parent, context, chain);
        }
    }

    fn build_concept(
        &mut self,
        tree: &mut CodebookTree,
        concept: &XmlElement,
        parent: NodeId,
        context: &DocContext,
        chain: &mut Vec<String>,
    ) {
        if concept.attr("type") == Some("group") {
            self.build_group(tree, concept, parent, context, chain);
        } else {
            let item = self.build_leaf(concept, context);
            tree.attach(item, parent);
        }
    }

    fn build_group(
        &mut self,
        tree: &mut CodebookTree,
        concept: &XmlElement,
        parent: NodeId,
        context: &DocContext,
        chain: &mut Vec<String>,
    ) {
        if let Some(inherit) = concept.child("inherit") {
            self.follow_reference(tree, concept, inherit, parent, context, chain);
            return;
        }

        let source_id = concept.attr_or_empty("id");
        let name = text_in(concept, "name", &self.language);

        if self.groups_selectable {
            // This codebook treats group concepts as selectable items: wrap
            // them in a dummy group and hang the children off the item.
            let wrapper = Item::new(self.ids.next(source_id), NodeKind::Group, name.clone());
            let wrapper_node = tree.attach(wrapper, parent);
            let selectable = self.build_leaf(concept, context);
            let item_node = tree.attach(selectable, wrapper_node);
            self.build_children(tree, concept, item_node, context, chain);
            return;
        }

        let mut group = Item::new(self.ids.next(source_id), NodeKind::Group, name);
        group.description = text_in(concept, "desc", &self.language);
        if let Some(association) = context.association(source_id) {
            group.ontology = Some(leaf::binding_from(association, context));
        }
        let node = tree.attach(group, parent);
        self.build_children(tree, concept, node, context, chain);
    }

    fn follow_reference(
        &mut self,
        tree: &mut CodebookTree,
        concept: &XmlElement,
        inherit: &XmlElement,
        parent: NodeId,
        context: &DocContext,
        chain: &mut Vec<String>,
    ) {
        let ref_id = inherit.attr_or_empty("ref").to_string();
        let concept_name = text_in(concept, "name", &self.language);

        if chain.iter().any(|id| *id == ref_id) {
            let item_id = self.ids.next(&ref_id);
            self.attach_info(
                tree,
                parent,
                item_id,
                concept_name,
                format!("infinite reference to concept {ref_id}, not expanded"),
                IssueKind::ReferenceCycle,
            );
            return;
        }

        let referenced = match inherit.attr("dataset") {
            // Reference into another dataset of the same codebook; the
            // registry memoizes the fetch.
            Some(dataset_id) => {
                match self
                    .registry
                    .dataset(&self.codebook, dataset_id, &self.language)
                {
                    Ok(document) => Some(DocContext::new(document)),
                    Err(error) => {
                        warn!(%error, dataset_id, "referenced dataset unavailable");
                        None
                    }
                }
            }
            None => Some(DocContext::new(context.document.clone())),
        };

        let Some(ref_context) = referenced else {
            let item_id = self.ids.next(&ref_id);
            self.attach_info(
                tree,
                parent,
                item_id,
                concept_name,
                format!("referenced dataset for concept {ref_id} could not be loaded"),
                IssueKind::UnresolvedReference,
            );
            return;
        };

        let document = ref_context.document.clone();
        match document.concept_by_id(&ref_id) {
            Some(target) => {
                chain.push(ref_id);
                self.build_concept(tree, target, parent, &ref_context, chain);
                chain.pop();
            }
            None => {
                let item_id = self.ids.next(&ref_id);
                self.attach_info(
                    tree,
                    parent,
                    item_id,
                    concept_name,
                    format!("referenced concept {ref_id} not found"),
                    IssueKind::UnresolvedReference,
                );
            }
        }
    }

    /// Attach a non-selectable informational leaf and record the issue.
    pub(crate) fn attach_info(
        &mut self,
        tree: &mut CodebookTree,
        parent: NodeId,
        item_id: String,
        name: String,
        message: String,
        kind: IssueKind,
    ) {
        attach_info_leaf(tree, parent, item_id, name, message, kind, &mut self.issues);
    }
}
