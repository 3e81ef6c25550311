//! Graph materializer: lazy expansion of the dialogue graph into a tree
//!
//! [`DlgTree`] owns the node arena, the identity registry and the resource
//! catalog for one open tree session. Nodes are created on first navigation
//! into their parent; a record encountered a second time becomes a
//! non-expanding alias of its main node instead of spawning a second
//! subtree, which is what makes cyclic and mutually-referential dialogues
//! finite to display.
//!
//! Broken references never fail a traversal: a missing response index, a
//! missing target state or an unloadable target resource each materialize
//! as a sentinel leaf in place of the child that could not be built.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{ResourceCatalog, canonical};
use crate::error::{Error, Result};
use crate::record::{RecordRef, RecordSlot, ResourceId};
use crate::tree::node::{Node, NodeId, NodeIcon, NodeKind, TreePath};
use crate::tree::orphan;
use crate::tree::propagate::TreeEvent;
use crate::tree::registry::Registry;
use crate::tree::worker::CancelToken;

const NO_CHILDREN: &[NodeId] = &[];

/// What expanding an alias node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AliasPolicy {
    /// Aliases never expand; navigation follows `main_alias` to the owning
    /// node instead. Cycles terminate after one alias hop.
    #[default]
    Redirect,
    /// Aliases expand like main nodes. Every child they produce is itself
    /// an alias, so a cyclic dialogue can be followed indefinitely; bulk
    /// operations still refuse to descend through aliases.
    Expand,
}

/// Per-tree materialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Alias expansion policy.
    pub alias_policy: AliasPolicy,
    /// Treat state 0 as a dialogue entry point even when it is gated by a
    /// trigger.
    pub show_state_zero: bool,
}

/// A materialized dialogue tree session.
///
/// All navigation, registry mutation and propagation run on the thread that
/// owns the tree; background bulk expansion shares it behind a mutex (see
/// [`crate::tree::worker`]).
pub struct DlgTree {
    catalog: ResourceCatalog,
    config: TreeConfig,
    nodes: Vec<Node>,
    registry: Registry,
    /// Dialogue root per loaded resource, created lazily on first
    /// cross-resource resolution.
    dialogue_roots: HashMap<ResourceId, NodeId>,
    root: NodeId,
    orphan_states: NodeId,
    orphan_responses: NodeId,
    home: ResourceId,
    /// Structural notifications not yet collected by the propagator.
    pub(crate) events: Vec<TreeEvent>,
}

impl DlgTree {
    /// Open a tree session rooted at the named home resource.
    ///
    /// The root container is seeded with the home resource's dialogue root
    /// and the two fixed orphan containers; everything else materializes on
    /// demand.
    pub fn open(
        mut catalog: ResourceCatalog,
        home_resource: &str,
        config: TreeConfig,
    ) -> Result<Self> {
        let (home, _) = catalog.resolve(home_resource)?;
        let mut tree = Self {
            catalog,
            config,
            nodes: Vec::new(),
            registry: Registry::new(),
            dialogue_roots: HashMap::new(),
            root: NodeId(0),
            orphan_states: NodeId(0),
            orphan_responses: NodeId(0),
            home,
            events: Vec::new(),
        };

        let root = tree.alloc(None, NodeKind::Root);
        tree.nodes[root.index()].expandable = true;

        let home_root = tree.alloc(Some(root), NodeKind::DialogueRoot { resource: home });
        tree.nodes[home_root.index()].expandable = true;
        tree.dialogue_roots.insert(home, home_root);

        let orphan_states = tree.alloc(Some(root), NodeKind::OrphanStates);
        tree.nodes[orphan_states.index()].expandable = true;
        tree.nodes[orphan_states.index()].children = Some(Vec::new());

        let orphan_responses = tree.alloc(Some(root), NodeKind::OrphanResponses);
        tree.nodes[orphan_responses.index()].expandable = true;
        tree.nodes[orphan_responses.index()].children = Some(Vec::new());

        tree.nodes[root.index()].children =
            Some(vec![home_root, orphan_states, orphan_responses]);
        tree.root = root;
        tree.orphan_states = orphan_states;
        tree.orphan_responses = orphan_responses;

        tracing::debug!(home = tree.home_resource(), "opened dialogue tree");
        Ok(tree)
    }

    // ==================== Navigation ====================

    /// The root container.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The synthetic container for unreferenced states.
    #[must_use]
    pub fn orphan_states(&self) -> NodeId {
        self.orphan_states
    }

    /// The synthetic container for unclaimed responses.
    #[must_use]
    pub fn orphan_responses(&self) -> NodeId {
        self.orphan_responses
    }

    /// Id of the home resource the session was opened on.
    #[must_use]
    pub fn home(&self) -> ResourceId {
        self.home
    }

    /// Canonical name of the home resource.
    #[must_use]
    pub fn home_resource(&self) -> &str {
        self.catalog.name_of(self.home).unwrap_or_default()
    }

    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The catalog backing this session.
    #[must_use]
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub(crate) fn catalog_mut(&mut self) -> &mut ResourceCatalog {
        &mut self.catalog
    }

    /// Borrow a live node.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .filter(|node| node.alive)
            .ok_or(Error::UnknownNode { id })
    }

    /// Path from the root to the node, root first.
    pub fn path(&self, id: NodeId) -> Result<TreePath> {
        let mut path = vec![id];
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            path.push(parent);
            current = self.node(parent)?;
        }
        path.reverse();
        Ok(path)
    }

    /// The main node to navigate to when `id` is an alias; `None` when `id`
    /// owns its own children.
    pub fn main_alias(&self, id: NodeId) -> Result<Option<NodeId>> {
        let node = self.node(id)?;
        if node.is_alias() {
            Ok(node.record.and_then(|record| self.registry.main_of(record)))
        } else {
            Ok(None)
        }
    }

    /// Human-readable label, including the broken-reference marker for
    /// sentinels.
    pub fn label(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Root => self.home_resource().to_string(),
            NodeKind::DialogueRoot { resource } => self
                .catalog
                .name_of(*resource)
                .unwrap_or_default()
                .to_string(),
            NodeKind::State { number } => format!("State {number}"),
            NodeKind::Response { number } => format!("Response {number}"),
            NodeKind::BrokenState { resource, number } => {
                format!("Broken reference: state {number} in {resource}")
            }
            NodeKind::BrokenResponse { number } => {
                format!("Broken reference: response {number}")
            }
            NodeKind::OrphanStates => "Orphan states".to_string(),
            NodeKind::OrphanResponses => "Orphan responses".to_string(),
        })
    }

    /// Icon hint for a rendering layer.
    pub fn icon(&self, id: NodeId) -> Result<NodeIcon> {
        Ok(self.node(id)?.icon())
    }

    /// Whether expansion may ever produce children at `id`.
    pub fn allows_children(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.allows_children())
    }

    // ==================== Expansion ====================

    /// Children of a node, materializing them on first access.
    ///
    /// The populated list is cached and every later call returns the same
    /// ids; only an explicit record-removed mutation ever shrinks it.
    /// Calling this on a node whose `allows_children` is `false` is a
    /// contract violation and fails with [`Error::NotExpandable`].
    pub fn children(&mut self, id: NodeId) -> Result<&[NodeId]> {
        self.ensure_expanded(id)?;
        Ok(self.nodes[id.index()].children.as_deref().unwrap_or(NO_CHILDREN))
    }

    /// Number of children, materializing on demand. Zero for nodes that do
    /// not allow children.
    pub fn children_count(&mut self, id: NodeId) -> Result<usize> {
        if !self.node(id)?.allows_children() {
            return Ok(0);
        }
        Ok(self.children(id)?.len())
    }

    /// Child at `index`, materializing on demand.
    pub fn child(&mut self, id: NodeId, index: usize) -> Result<Option<NodeId>> {
        if !self.node(id)?.allows_children() {
            return Ok(None);
        }
        Ok(self.children(id)?.get(index).copied())
    }

    /// Children populated so far, without materializing anything.
    pub fn cached_children(&self, id: NodeId) -> Result<Option<&[NodeId]>> {
        Ok(self.node(id)?.cached_children())
    }

    fn ensure_expanded(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if !node.expandable {
            return Err(Error::NotExpandable { id });
        }
        if node.children.is_some() {
            return Ok(());
        }

        let children = match node.kind.clone() {
            NodeKind::DialogueRoot { resource } => self.expand_dialogue_root(id, resource),
            NodeKind::State { number } => self.expand_state(id, number),
            NodeKind::Response { number } => self.expand_response(id, number),
            // Root and the orphan containers are seeded at creation;
            // sentinels are never expandable.
            _ => Vec::new(),
        };
        self.nodes[id.index()].children = Some(children);
        Ok(())
    }

    /// Entry-point states of a resource, in declaration order.
    fn expand_dialogue_root(&mut self, id: NodeId, resource: ResourceId) -> Vec<NodeId> {
        let Some(store) = self.catalog.get(resource) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for number in store.state_numbers() {
            let Some(state) = store.state(number) else {
                continue;
            };
            let entry = state.is_entry_point() || (number == 0 && self.config.show_state_zero);
            if entry {
                children.push(self.new_record_node(id, resource, RecordSlot::State(number)));
            }
        }
        tracing::debug!(
            resource = self.catalog.name_of(resource).unwrap_or_default(),
            entry_states = children.len(),
            "expanded dialogue root"
        );
        children
    }

    /// One child per response index in the state's declared range; indices
    /// missing from the store become broken-response sentinels.
    fn expand_state(&mut self, id: NodeId, number: u32) -> Vec<NodeId> {
        let Some(record) = self.nodes[id.index()].record else {
            return Vec::new();
        };
        let resource = record.resource;
        let Some(store) = self.catalog.get(resource) else {
            return Vec::new();
        };
        let Some(state) = store.state(number) else {
            tracing::warn!(number, "state record vanished before expansion");
            return Vec::new();
        };

        let mut children = Vec::new();
        for index in state.response_range() {
            if store.response(index).is_some() {
                children.push(self.new_record_node(id, resource, RecordSlot::Response(index)));
            } else {
                tracing::warn!(
                    state = number,
                    response = index,
                    "response index out of range, inserting sentinel"
                );
                children.push(self.new_sentinel(id, NodeKind::BrokenResponse { number: index }));
            }
        }
        children
    }

    /// The target state of a non-terminating response: at most one child,
    /// resolved through the catalog for cross-resource links.
    fn expand_response(&mut self, id: NodeId, number: u32) -> Vec<NodeId> {
        let Some(record) = self.nodes[id.index()].record else {
            return Vec::new();
        };
        let resource = record.resource;
        let Some(store) = self.catalog.get(resource) else {
            return Vec::new();
        };
        let Some(response) = store.response(number) else {
            tracing::warn!(number, "response record vanished before expansion");
            return Vec::new();
        };
        if response.terminates() {
            return Vec::new();
        }
        let Some(target) = response.target else {
            return Vec::new();
        };

        // Same-name targets resolve to the current store without a catalog
        // round-trip.
        let resolved = if canonical(&target.resource) == canonical(store.name()) {
            Ok((resource, Arc::clone(&store)))
        } else {
            self.catalog.resolve(&target.resource)
        };
        let (target_id, target_store) = match resolved {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(
                    target = %target.resource,
                    error = %err,
                    "target resource unresolvable, inserting sentinel"
                );
                return vec![self.new_sentinel(
                    id,
                    NodeKind::BrokenState {
                        resource: canonical(&target.resource),
                        number: target.state,
                    },
                )];
            }
        };

        self.ensure_dialogue_root(target_id);

        if target_store.state(target.state).is_some() {
            vec![self.new_record_node(id, target_id, RecordSlot::State(target.state))]
        } else {
            tracing::warn!(
                target = %target.resource,
                state = target.state,
                "target state missing, inserting sentinel"
            );
            vec![self.new_sentinel(
                id,
                NodeKind::BrokenState {
                    resource: canonical(&target.resource),
                    number: target.state,
                },
            )]
        }
    }

    /// Dialogue root for a resource, created lazily the first time the
    /// resource is resolved from a cross-resource link.
    pub(crate) fn ensure_dialogue_root(&mut self, resource: ResourceId) -> NodeId {
        if let Some(existing) = self.dialogue_roots.get(&resource) {
            return *existing;
        }
        let root = self.root;
        let id = self.alloc(Some(root), NodeKind::DialogueRoot { resource });
        self.nodes[id.index()].expandable = true;
        self.dialogue_roots.insert(resource, id);

        // Dialogue roots stay ahead of the two fixed orphan containers.
        let index = if let Some(children) = self.nodes[root.index()].children.as_mut() {
            let index = children.len().saturating_sub(2);
            children.insert(index, id);
            index
        } else {
            0
        };
        self.events.push(TreeEvent::Inserted {
            parent_path: vec![root],
            index,
        });
        tracing::debug!(
            resource = self.catalog.name_of(resource).unwrap_or_default(),
            "attached dialogue root"
        );
        id
    }

    // ==================== Node construction ====================

    fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, parent, kind));
        id
    }

    /// Build a node for a record, consulting the registry to decide whether
    /// it becomes the record's main node or an alias.
    fn new_record_node(
        &mut self,
        parent: NodeId,
        resource: ResourceId,
        slot: RecordSlot,
    ) -> NodeId {
        let record = RecordRef { resource, slot };
        let kind = match slot {
            RecordSlot::State(number) => NodeKind::State { number },
            RecordSlot::Response(number) => NodeKind::Response { number },
        };
        let id = self.alloc(Some(parent), kind);
        let is_main = self.registry.register(record, id);

        let terminating = match slot {
            RecordSlot::State(_) => false,
            RecordSlot::Response(number) => self
                .catalog
                .get(resource)
                .and_then(|store| store.response(number))
                .is_none_or(|response| response.terminates()),
        };
        let owns_children =
            is_main || matches!(self.config.alias_policy, AliasPolicy::Expand);

        let node = &mut self.nodes[id.index()];
        node.record = Some(record);
        node.is_main = is_main;
        node.expandable = owns_children && !terminating;
        id
    }

    fn new_sentinel(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(Some(parent), kind);
        let node = &mut self.nodes[id.index()];
        node.children = Some(Vec::new());
        node.expandable = false;
        id
    }

    /// File a record under the matching orphan container and register it as
    /// main. Used by the orphan scanner after an exhausted referrer search.
    pub(crate) fn attach_orphan(&mut self, record: RecordRef) -> NodeId {
        let container = match record.slot {
            RecordSlot::State(_) => self.orphan_states,
            RecordSlot::Response(_) => self.orphan_responses,
        };
        let id = self.new_record_node(container, record.resource, record.slot);
        let index = if let Some(children) = self.nodes[container.index()].children.as_mut() {
            children.push(id);
            children.len() - 1
        } else {
            0
        };
        let parent_path = self.path(container).unwrap_or_default();
        self.events.push(TreeEvent::Inserted { parent_path, index });
        tracing::debug!(
            resource = self.catalog.name_of(record.resource).unwrap_or_default(),
            slot = %record.slot,
            "attached orphan record"
        );
        id
    }

    // ==================== Locate ====================

    /// Find the main node displaying a record, materializing ancestors as
    /// needed.
    ///
    /// Resolution is tiered: a registry hit is free; otherwise the
    /// already-attached frontier is expanded depth-first (bounded, since a
    /// record becomes main at most once); otherwise the orphan scanner
    /// searches the corpus for a referrer and, on exhaustion, files the
    /// record under the matching orphan container. Returns `Ok(None)` only
    /// when the record itself does not exist in its store.
    pub fn locate(&mut self, resource: &str, slot: RecordSlot) -> Result<Option<NodeId>> {
        self.locate_cancellable(resource, slot, &CancelToken::new())
    }

    /// [`locate`](Self::locate) with cooperative cancellation, for callers
    /// that run the full-corpus fallback on a background worker. Fails with
    /// [`Error::Cancelled`] when the token fires before an answer exists.
    pub fn locate_cancellable(
        &mut self,
        resource: &str,
        slot: RecordSlot,
        token: &CancelToken,
    ) -> Result<Option<NodeId>> {
        let (resource_id, store) = self.catalog.resolve(resource)?;
        let exists = match slot {
            RecordSlot::State(number) => store.state(number).is_some(),
            RecordSlot::Response(number) => store.response(number).is_some(),
        };
        if !exists {
            return Ok(None);
        }

        let record = RecordRef {
            resource: resource_id,
            slot,
        };
        if let Some(main) = self.registry.main_of(record) {
            return Ok(Some(main));
        }
        if let Some(found) = self.frontier_search(record, self.root, token)? {
            return Ok(Some(found));
        }
        orphan::resolve_unreachable(self, record, token)
    }

    /// Depth-first search over not-yet-expanded candidates, starting at
    /// `start`.
    ///
    /// Expansion is the side effect that fills the registry, so each popped
    /// node is expanded and the registry re-checked. Only main nodes are
    /// descended into - each record becomes main at most once, which bounds
    /// the walk to the number of distinct records in the corpus.
    pub(crate) fn frontier_search(
        &mut self,
        record: RecordRef,
        start: NodeId,
        token: &CancelToken,
    ) -> Result<Option<NodeId>> {
        let mut stack = vec![start];
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(id) = stack.pop() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !visited.insert(id) {
                continue;
            }
            let children = self.children(id)?.to_vec();
            if let Some(main) = self.registry.main_of(record) {
                return Ok(Some(main));
            }
            for child in children {
                let node = &self.nodes[child.index()];
                if node.alive && node.expandable && (node.record.is_none() || node.is_main) {
                    stack.push(child);
                }
            }
        }
        Ok(None)
    }

    // ==================== Mutation support ====================

    /// Structural notifications produced by materialization (lazily attached
    /// dialogue roots, orphan attachments) since the last call.
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Instances of a record that are still structurally attached to the
    /// tree, main first.
    pub(crate) fn attached_instances(&self, record: RecordRef) -> Vec<NodeId> {
        self.registry
            .instances_of(record)
            .into_iter()
            .filter(|id| self.is_attached(*id))
            .collect()
    }

    /// A node is attached while it and every ancestor up to the root are
    /// alive.
    pub(crate) fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.nodes.get(current.index()).filter(|n| n.alive) else {
                return false;
            };
            match node.parent {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    /// Detach a node from its parent's child list and tombstone it. Returns
    /// the parent path and the index the node occupied, for removal
    /// notifications.
    pub(crate) fn detach_instance(&mut self, id: NodeId) -> Option<(TreePath, usize)> {
        let parent = self.nodes.get(id.index()).and_then(|node| node.parent)?;
        let parent_path = self.path(parent).ok()?;
        let mut removed_at = None;
        if let Some(children) = self.nodes[parent.index()].children.as_mut() {
            if let Some(position) = children.iter().position(|child| *child == id) {
                children.remove(position);
                removed_at = Some(position);
            }
        }
        self.nodes[id.index()].alive = false;
        removed_at.map(|index| (parent_path, index))
    }

    pub(crate) fn unregister_record(&mut self, record: RecordRef) {
        self.registry.unregister(record);
    }

    /// Total nodes ever allocated in this session, tombstones included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct records currently registered.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::MemoryProvider;
    use crate::record::{ResponseFlags, ResponseRecord, ResponseTarget, StateRecord, StrRef};
    use crate::store::MemoryStore;

    fn state(number: u32, first_response: u32, count: u32, trigger: Option<u32>) -> StateRecord {
        StateRecord {
            number,
            text: StrRef(number),
            first_response,
            response_count: count,
            trigger,
        }
    }

    fn response_to(number: u32, resource: &str, target_state: u32) -> ResponseRecord {
        ResponseRecord {
            number,
            flags: ResponseFlags::new(ResponseFlags::HAS_TEXT),
            text: StrRef(number),
            journal: StrRef(0),
            trigger: None,
            action: None,
            target: Some(ResponseTarget {
                resource: resource.to_string(),
                state: target_state,
            }),
        }
    }

    fn open_tree(stores: Vec<MemoryStore>, home: &str) -> DlgTree {
        let mut provider = MemoryProvider::new();
        for store in stores {
            provider.add(Arc::new(store));
        }
        DlgTree::open(
            ResourceCatalog::new(Box::new(provider)),
            home,
            TreeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_expansion_is_cached() {
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 0, 1, None));
        store.put_response(response_to(0, "A.DLG", 0));
        let mut tree = open_tree(vec![store], "A.DLG");

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let first = tree.children(dialogue).unwrap().to_vec();
        let second = tree.children(dialogue).unwrap().to_vec();
        assert_eq!(first, second);
        let node_count = tree.node_count();
        tree.children(dialogue).unwrap();
        assert_eq!(tree.node_count(), node_count);
    }

    #[test]
    fn test_self_cycle_ends_in_one_alias_hop() {
        // State 0's only response targets state 0 itself.
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 0, 1, None));
        store.put_response(response_to(0, "A.DLG", 0));
        let mut tree = open_tree(vec![store], "A.DLG");

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let state_node = tree.children(dialogue).unwrap()[0];
        let response_node = tree.children(state_node).unwrap()[0];
        let alias = tree.children(response_node).unwrap()[0];

        let alias_ref = tree.node(alias).unwrap();
        assert!(alias_ref.is_alias());
        assert!(!alias_ref.allows_children());
        assert_eq!(tree.main_alias(alias).unwrap(), Some(state_node));
        assert!(matches!(
            tree.children(alias),
            Err(Error::NotExpandable { .. })
        ));
    }

    #[test]
    fn test_ragged_range_yields_sentinels() {
        // Declared range [5, 7) with only responses 0-4 present.
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 5, 2, None));
        for number in 0..5 {
            store.put_response(response_to(number, "A.DLG", 0));
        }
        let mut tree = open_tree(vec![store], "A.DLG");

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let state_node = tree.children(dialogue).unwrap()[0];
        let children = tree.children(state_node).unwrap().to_vec();
        assert_eq!(children.len(), 2);

        let numbers: Vec<u32> = children
            .iter()
            .map(|id| match tree.node(*id).unwrap().kind() {
                NodeKind::BrokenResponse { number } => *number,
                other => panic!("expected broken response, got {other:?}"),
            })
            .collect();
        assert_eq!(numbers, vec![5, 6]);
        assert!(tree.label(children[0]).unwrap().contains("Broken reference"));
    }

    #[test]
    fn test_unresolvable_target_yields_sentinel() {
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 0, 1, None));
        store.put_response(response_to(0, "MISSING.DLG", 3));
        let mut tree = open_tree(vec![store], "A.DLG");

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let state_node = tree.children(dialogue).unwrap()[0];
        let response_node = tree.children(state_node).unwrap()[0];
        let sentinel = tree.children(response_node).unwrap()[0];
        assert_eq!(
            tree.node(sentinel).unwrap().kind(),
            &NodeKind::BrokenState {
                resource: "MISSING.DLG".to_string(),
                number: 3,
            }
        );
        assert!(!tree.allows_children(sentinel).unwrap());
    }

    #[test]
    fn test_cross_resource_resolution_is_deterministic() {
        // Two responses in A both target B; B's store must be resolved once
        // and its dialogue root attached once.
        let a = MemoryStore::new("A.DLG");
        a.put_state(state(0, 0, 2, None));
        a.put_response(response_to(0, "B.DLG", 0));
        a.put_response(response_to(1, "B.DLG", 1));
        let b = MemoryStore::new("B.DLG");
        b.put_state(state(0, 0, 0, None));
        b.put_state(state(1, 0, 0, Some(1)));
        let mut tree = open_tree(vec![a, b], "A.DLG");

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let state_node = tree.children(dialogue).unwrap()[0];
        let responses = tree.children(state_node).unwrap().to_vec();
        for response in responses {
            tree.children(response).unwrap();
        }

        assert_eq!(tree.catalog().loaded_count(), 2);
        // Root now holds two dialogue roots ahead of the orphan containers.
        let root_children = tree.children(tree.root()).unwrap().to_vec();
        assert_eq!(root_children.len(), 4);
        let dialogue_roots = root_children
            .iter()
            .filter(|id| {
                matches!(
                    tree.node(**id).unwrap().kind(),
                    NodeKind::DialogueRoot { .. }
                )
            })
            .count();
        assert_eq!(dialogue_roots, 2);
    }

    #[test]
    fn test_entry_points_respect_show_state_zero() {
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 0, 0, Some(7))); // gated state 0
        store.put_state(state(1, 0, 0, None));
        let mut provider = MemoryProvider::new();
        provider.add(Arc::new(store));
        let mut tree = DlgTree::open(
            ResourceCatalog::new(Box::new(provider)),
            "A.DLG",
            TreeConfig {
                show_state_zero: true,
                ..TreeConfig::default()
            },
        )
        .unwrap();

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let entries: Vec<u32> = tree
            .children(dialogue)
            .unwrap()
            .to_vec()
            .iter()
            .map(|id| match tree.node(*id).unwrap().kind() {
                NodeKind::State { number } => *number,
                other => panic!("expected state, got {other:?}"),
            })
            .collect();
        assert_eq!(entries, vec![0, 1]);
    }

    #[test]
    fn test_expand_alias_policy_allows_following_cycles() {
        let store = MemoryStore::new("A.DLG");
        store.put_state(state(0, 0, 1, None));
        store.put_response(response_to(0, "A.DLG", 0));
        let mut provider = MemoryProvider::new();
        provider.add(Arc::new(store));
        let mut tree = DlgTree::open(
            ResourceCatalog::new(Box::new(provider)),
            "A.DLG",
            TreeConfig {
                alias_policy: AliasPolicy::Expand,
                ..TreeConfig::default()
            },
        )
        .unwrap();

        let dialogue = tree.children(tree.root()).unwrap()[0];
        let state_node = tree.children(dialogue).unwrap()[0];
        let response_node = tree.children(state_node).unwrap()[0];
        let alias = tree.children(response_node).unwrap()[0];
        assert!(tree.node(alias).unwrap().is_alias());
        // Aliases expand under this policy; their children are aliases too.
        let alias_response = tree.children(alias).unwrap()[0];
        let deeper = tree.node(alias_response).unwrap();
        assert!(deeper.is_alias());
    }
}
