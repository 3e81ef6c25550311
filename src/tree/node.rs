//! Node model: the vocabulary of dialogue tree nodes
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! [`NodeId`]; no node owns another, which is what lets a cyclic dialogue
//! graph flatten into a tree without reference cycles. A node's children
//! list is populated at most once and then cached; `None` means "not yet
//! expanded".

use serde::{Deserialize, Serialize};

use crate::record::{RecordRef, ResourceId};

/// Handle to a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Path from the root to a node, root first.
pub type TreePath = Vec<NodeId>;

/// The closed set of node variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The single root container: per-resource dialogue roots plus the two
    /// fixed orphan containers.
    Root,
    /// One loaded resource; its children are the resource's dialogue entry
    /// states.
    DialogueRoot {
        /// The resource this root displays.
        resource: ResourceId,
    },
    /// A state record.
    State {
        /// The state's sequence number.
        number: u32,
    },
    /// A response record.
    Response {
        /// The response's sequence number.
        number: u32,
    },
    /// A referenced state number that does not exist in the target resource,
    /// or a target resource that could not be loaded at all.
    BrokenState {
        /// Name of the resource the reference pointed at.
        resource: String,
        /// The missing state number.
        number: u32,
    },
    /// A response index inside a state's declared range that does not exist
    /// in the store.
    BrokenResponse {
        /// The missing response number.
        number: u32,
    },
    /// Container for states with no referrer anywhere in the corpus.
    OrphanStates,
    /// Container for responses no state claims.
    OrphanResponses,
}

/// Icon hint a rendering layer maps to a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeIcon {
    Root,
    Dialogue,
    State,
    Response,
    Broken,
    Orphan,
}

/// One node of the materialized tree.
///
/// Navigation queries that need the arena (children, paths, labels) live on
/// [`DlgTree`](crate::tree::DlgTree); the accessors here answer what a node
/// knows about itself.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    /// Identity of the displayed record; `None` for containers and
    /// sentinels.
    pub(crate) record: Option<RecordRef>,
    /// Whether this node is the record's main instance. Containers and
    /// sentinels are never main.
    pub(crate) is_main: bool,
    /// Whether expansion may ever produce children.
    pub(crate) expandable: bool,
    /// Cached children; `None` until first expansion.
    pub(crate) children: Option<Vec<NodeId>>,
    /// Cleared when the underlying record is deleted.
    pub(crate) alive: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            id,
            parent,
            kind,
            record: None,
            is_main: false,
            expandable: false,
            children: None,
            alive: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Identity of the record this node displays, if any.
    #[must_use]
    pub fn record(&self) -> Option<RecordRef> {
        self.record
    }

    /// Whether this node owns the record's children.
    ///
    /// Exactly one node per record is main; every other node displaying the
    /// same record is an alias.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.is_main
    }

    /// Whether this node is an alias of a main node elsewhere in the tree.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.record.is_some() && !self.is_main
    }

    /// Whether expansion may ever produce children here.
    #[must_use]
    pub fn allows_children(&self) -> bool {
        self.expandable
    }

    /// Whether the children cache has been populated.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// A node is a leaf when it can never have children, or when expansion
    /// found none.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        match &self.children {
            Some(children) => children.is_empty(),
            None => !self.expandable,
        }
    }

    /// Children populated so far; `None` if not yet expanded.
    #[must_use]
    pub fn cached_children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    #[must_use]
    pub fn icon(&self) -> NodeIcon {
        match &self.kind {
            NodeKind::Root => NodeIcon::Root,
            NodeKind::DialogueRoot { .. } => NodeIcon::Dialogue,
            NodeKind::State { .. } => NodeIcon::State,
            NodeKind::Response { .. } => NodeIcon::Response,
            NodeKind::BrokenState { .. } | NodeKind::BrokenResponse { .. } => NodeIcon::Broken,
            NodeKind::OrphanStates | NodeKind::OrphanResponses => NodeIcon::Orphan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_semantics() {
        let mut node = Node::new(NodeId(0), None, NodeKind::State { number: 0 });
        node.expandable = true;
        assert!(!node.is_leaf()); // unexpanded but expandable
        node.children = Some(Vec::new());
        assert!(node.is_leaf()); // expanded, nothing there

        let sentinel = Node::new(NodeId(1), Some(NodeId(0)), NodeKind::BrokenResponse { number: 7 });
        assert!(sentinel.is_leaf());
        assert!(!sentinel.allows_children());
        assert_eq!(sentinel.icon(), NodeIcon::Broken);
    }
}
