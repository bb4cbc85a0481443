//! Structure tree: the hierarchical presentation order of items.
//!
//! Nodes live in an arena owned by the tree; builders hold copyable
//! `NodeId` handles while descending, which keeps "current parent"
//! bookkeeping trivial during recursive construction. `attach` is the only
//! growth operation; nothing is ever removed.

use serde::{Deserialize, Serialize};

use crate::enums::NodeKind;
use crate::item::Item;

/// Handle to a node inside a [`CodebookTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// One tree node: exactly one item plus child handles in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub item: Item,
    children: Vec<NodeId>,
}

impl Node {
    /// Child handles, insertion order = presentation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The normalized tree for one (codebook, document, language) build.
///
/// The root is a synthetic GROUP item named after the codebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebookTree {
    nodes: Vec<Node>,
}

impl CodebookTree {
    /// Create a tree with a synthetic GROUP root named after the codebook.
    pub fn new(codebook_name: impl Into<String>) -> Self {
        let name = codebook_name.into();
        let root = Item::new(name.clone(), NodeKind::Group, name);
        Self {
            nodes: vec![Node {
                item: root,
                children: Vec::new(),
            }],
        }
    }

    /// Handle of the synthetic root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Attach an item below `parent`, returning the new node's handle.
    pub fn attach(&mut self, item: Item, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            item,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn item(&self, id: NodeId) -> &Item {
        &self.nodes[id.0].item
    }

    /// Mutable item access for the documented post-construction writes.
    pub fn item_mut(&mut self, id: NodeId) -> &mut Item {
        &mut self.nodes[id.0].item
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first traversal, children in insertion order, root first.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![(self.root(), 0)],
        }
    }
}

/// Iterator state for [`CodebookTree::walk`]. Yields `(handle, depth)`.
pub struct Walk<'a> {
    tree: &'a CodebookTree,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for Walk<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let node = self.tree.node(id);
        for child in node.children().iter().rev() {
            self.stack.push((*child, depth + 1));
        }
        Some((id, depth))
    }
}
