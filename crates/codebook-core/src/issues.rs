//! Build diagnostics.
//!
//! Recoverable problems during a build (unresolvable references, broken
//! codelists, constraints that would not parse) do not abort the build;
//! they are collected here so the surrounding application can tell the
//! user "this item could not be built" apart from "the codebook failed to
//! load".

use serde::Serialize;

use codebook_model::{CodebookTree, Item, NodeId, NodeKind};

/// Category of a recoverable build problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A referenced dataset concept or archetype could not be resolved.
    UnresolvedReference,
    /// A reference chain led back to itself; expansion was suppressed.
    ReferenceCycle,
    /// A codelist was structurally malformed and has been cleared.
    BrokenCodeList,
    /// A constraint (duration/interval) could not be parsed; the leaf was
    /// dropped.
    UnparsableConstraint,
    /// A leaf type outside the known vocabulary; degraded to string.
    UnknownLeafType,
}

/// One recoverable problem, anchored to the item it concerns.
#[derive(Debug, Clone, Serialize)]
pub struct BuildIssue {
    /// Id of the affected (or placeholder) item.
    pub item_id: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Result of one build: the normalized tree plus its diagnostics.
#[derive(Debug)]
pub struct CodebookBuild {
    pub tree: CodebookTree,
    pub issues: Vec<BuildIssue>,
}

impl CodebookBuild {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Number of issues of one kind.
    pub fn count_of(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }
}

/// Attach a LEAF-INFO placeholder and record the matching issue. Shared by
/// both builders.
pub(crate) fn attach_info_leaf(
    tree: &mut CodebookTree,
    parent: NodeId,
    item_id: String,
    name: String,
    message: String,
    kind: IssueKind,
    issues: &mut Vec<BuildIssue>,
) {
    let mut item = Item::new(item_id.clone(), NodeKind::LeafInfo, name);
    item.description = message.clone();
    tree.attach(item, parent);
    issues.push(BuildIssue {
        item_id,
        kind,
        message,
    });
}
