//! Builder for flattened-archetype codebooks.
//!
//! Recursive descent over the typed object/attribute graph of a flattened
//! archetype. ELEMENT objects become leaves, composite objects become
//! groups, use-node proxies jump to a shared subtree by path, and slots
//! expand other archetypes in place when a candidate version resolves.
//! Cycle guards are per branch: the trail of expanded archetype names (and
//! proxy targets) is pushed before recursing and popped on return, so
//! sibling branches expand the same target independently.

mod duration;
mod leaf;
mod slots;

use tracing::warn;

use codebook_ingest::{
    CComplexObject, CComplexObjectProxy, CObject, CodebookSettings, IdentifierResolver,
};
use codebook_model::{CodebookTree, Item, NodeId, NodeKind};
use codebook_registry::{ArchetypeRecord, Registry};

use crate::error::Result;
use crate::ids::IdAllocator;
use crate::issues::{BuildIssue, CodebookBuild, IssueKind, attach_info_leaf};
use crate::adl::slots::{SlotCandidate, SlotTarget};

/// Per-branch recursion state: archetype names already expanded on this
/// branch, and use-node targets currently being dereferenced.
#[derive(Debug, Default)]
pub(crate) struct Trail {
    archetypes: Vec<String>,
    proxy_paths: Vec<String>,
}

pub struct AdlBuilder<'a> {
    registry: &'a Registry,
    resolver: &'a dyn IdentifierResolver,
    pub(crate) language: String,
    pub(crate) ids: IdAllocator,
    pub(crate) issues: Vec<BuildIssue>,
}

impl<'a> AdlBuilder<'a> {
    /// Build the normalized tree for one (codebook, archetype, language).
    pub fn build(
        registry: &'a Registry,
        resolver: &'a dyn IdentifierResolver,
        settings: &CodebookSettings,
        archetype_id: &str,
        language: &str,
    ) -> Result<CodebookBuild> {
        let record = registry.archetype(archetype_id)?;
        let mut builder = Self {
            registry,
            resolver,
            language: language.to_string(),
            ids: IdAllocator::new(),
            issues: Vec::new(),
        };
        let mut tree = CodebookTree::new(&settings.name);
        let root = tree.root();
        let mut trail = Trail::default();
        trail.archetypes.push(base_name(record.id()).to_string());
        builder.walk_object(&mut tree, &record, record.definition(), root, &mut trail);
        Ok(CodebookBuild {
            tree,
            issues: builder.issues,
        })
    }

    pub(crate) fn walk_object(
        &mut self,
        tree: &mut CodebookTree,
        record: &ArchetypeRecord,
        object: &CObject,
        parent: NodeId,
        trail: &mut Trail,
    ) {
        match object {
            CObject::Complex(complex) => {
                if complex.rm_type_name == "ELEMENT" {
                    self.build_element(tree, record, complex, parent);
                } else {
                    let group = self.group_item(record, complex);
                    let node = tree.attach(group, parent);
                    self.walk_attributes(tree, record, complex, node, trail);
                }
            }
            CObject::Proxy(proxy) => self.follow_proxy(tree, record, proxy, parent, trail),
            CObject::Slot(slot) => {
                for target in slots::slot_targets(slot) {
                    match target {
                        SlotTarget::Any => {
                            let item_id = self.ids.next(&slot.node_id);
                            self.attach_info(
                                tree,
                                parent,
                                item_id,
                                record.term_text(&self.language, &slot.node_id),
                                "slot allows any archetype; manual selection required".to_string(),
                                IssueKind::UnresolvedReference,
                            );
                        }
                        SlotTarget::Archetype(candidate) => {
                            self.expand_candidate(tree, record, slot.node_id.clone(), &candidate, parent, trail);
                        }
                    }
                }
            }
            // Primitive constraints carry no structure of their own.
            _ => {}
        }
    }

    fn walk_attributes(
        &mut self,
        tree: &mut CodebookTree,
        record: &ArchetypeRecord,
        complex: &CComplexObject,
        parent: NodeId,
        trail: &mut Trail,
    ) {
        for attribute in &complex.attributes {
            // Runtime name constraints are presentation, not structure.
            if attribute.rm_attribute_name == "name" {
                continue;
            }
            for child in &attribute.children {
                self.walk_object(tree, record, child, parent, trail);
            }
        }
    }

    /// Group item for a composite object, named by its local term.
    fn group_item(&mut self, record: &ArchetypeRecord, complex: &CComplexObject) -> Item {
        if complex.node_id.is_empty() {
            return Item::new(
                self.ids.next(&complex.rm_type_name),
                NodeKind::Group,
                complex.rm_type_name.clone(),
            );
        }
        let mut item = Item::new(
            self.ids.next(&complex.node_id),
            NodeKind::Group,
            record.term_text(&self.language, &complex.node_id),
        );
        item.description = record.term_description(&self.language, &complex.node_id);
        item
    }

    /// Dereference a use-node and continue descent at its target.
    fn follow_proxy(
        &mut self,
        tree: &mut CodebookTree,
        record: &ArchetypeRecord,
        proxy: &CComplexObjectProxy,
        parent: NodeId,
        trail: &mut Trail,
    ) {
        if trail.proxy_paths.contains(&proxy.target_path) {
            let item_id = self.ids.next(&proxy.node_id);
            self.attach_info(
                tree,
                parent,
                item_id,
                record.term_text(&self.language, &proxy.node_id),
                format!("use-node {} loops back onto itself", proxy.target_path),
                IssueKind::ReferenceCycle,
            );
            return;
        }
        match record.archetype().resolve_path(&proxy.target_path) {
            Some(target) => {
                trail.proxy_paths.push(proxy.target_path.clone());
                self.walk_object(tree, record, target, parent, trail);
                trail.proxy_paths.pop();
            }
            None => {
                warn!(target = %proxy.target_path, "use-node target not found");
                let item_id = self.ids.next(&proxy.node_id);
                self.attach_info(
                    tree,
                    parent,
                    item_id,
                    record.term_text(&self.language, &proxy.node_id),
                    format!("use-node target {} not found", proxy.target_path),
                    IssueKind::UnresolvedReference,
                );
            }
        }
    }

    /// Probe a slot candidate's versions (newest first) and expand the
    /// first one that resolves, under a new group node.
    fn expand_candidate(
        &mut self,
        tree: &mut CodebookTree,
        record: &ArchetypeRecord,
        slot_node_id: String,
        candidate: &SlotCandidate,
        parent: NodeId,
        trail: &mut Trail,
    ) {
        if trail.archetypes.contains(&candidate.name) {
            let item_id = self.ids.next(&candidate.name);
            self.attach_info(
                tree,
                parent,
                item_id,
                record.term_text(&self.language, &slot_node_id),
                format!(
                    "archetype {} not expanded, would recurse infinitely",
                    candidate.name
                ),
                IssueKind::ReferenceCycle,
            );
            return;
        }

        let probes: Vec<String> = if candidate.versions.is_empty() {
            vec![String::new()]
        } else {
            candidate.versions.clone()
        };
        let mut resolved = None;
        for version in &probes {
            match self.resolver.resolve(&candidate.name, version) {
                Ok(Some(identifier)) => {
                    resolved = Some(identifier);
                    break;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, name = %candidate.name, version = %version, "identifier resolution failed");
                }
            }
        }

        let Some(identifier) = resolved else {
            let item_id = self.ids.next(&candidate.name);
            self.attach_info(
                tree,
                parent,
                item_id,
                record.term_text(&self.language, &slot_node_id),
                format!(
                    "no resolvable version of {}; tried {}",
                    candidate.name,
                    candidate.versions.join(", ")
                ),
                IssueKind::UnresolvedReference,
            );
            return;
        };

        match self.registry.archetype(&identifier) {
            Ok(target) => {
                trail.archetypes.push(candidate.name.clone());
                match target.definition().as_complex() {
                    Some(root) => {
                        let group = self.group_item(&target, root);
                        let node = tree.attach(group, parent);
                        self.walk_attributes(tree, &target, root, node, trail);
                    }
                    None => {
                        let group = Item::new(
                            self.ids.next(&identifier),
                            NodeKind::Group,
                            identifier.clone(),
                        );
                        let node = tree.attach(group, parent);
                        self.walk_object(tree, &target, target.definition(), node, trail);
                    }
                }
                trail.archetypes.pop();
            }
            Err(error) => {
                warn!(%error, identifier = %identifier, "resolved archetype failed to load");
                let item_id = self.ids.next(&identifier);
                self.attach_info(
                    tree,
                    parent,
                    item_id,
                    record.term_text(&self.language, &slot_node_id),
                    format!("archetype {identifier} could not be loaded"),
                    IssueKind::UnresolvedReference,
                );
            }
        }
    }

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

/// Archetype name without its version suffix, the identity used by the
/// slot cycle guard.
fn base_name(archetype_id: &str) -> &str {
    match archetype_id.rfind(".v") {
        Some(position)
            if archetype_id[position + 2..]
                .chars()
                .all(|c| c.is_ascii_digit())
                && position + 2 < archetype_id.len() =>
        {
            &archetype_id[..position]
        }
        _ => archetype_id,
    }
}

/// Render a float bound without a trailing fractional zero.
pub(crate) fn format_magnitude(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
