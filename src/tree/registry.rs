//! Identity and aliasing registry
//!
//! Maps each record to its single main node and to every alias currently
//! displaying it. First registration wins main; everything after is an
//! alias. Owned by the tree instance - two open trees never share one.

use std::collections::HashMap;

use crate::record::RecordRef;
use crate::tree::node::NodeId;

const NO_ALIASES: &[NodeId] = &[];

#[derive(Debug)]
struct Entry {
    main: NodeId,
    aliases: Vec<NodeId>,
}

/// Record identity bookkeeping for one tree.
///
/// Consulted before any node is constructed for a record that might already
/// be known; it is the single authority on the main-versus-alias question.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<RecordRef, Entry>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node for a record. Returns `true` if the node became the
    /// record's main node, `false` if it was filed as an alias.
    pub fn register(&mut self, record: RecordRef, node: NodeId) -> bool {
        match self.entries.entry(record) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Entry {
                    main: node,
                    aliases: Vec::new(),
                });
                true
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                slot.get_mut().aliases.push(node);
                false
            }
        }
    }

    /// The record's main node, if it has been seen.
    #[must_use]
    pub fn main_of(&self, record: RecordRef) -> Option<NodeId> {
        self.entries.get(&record).map(|entry| entry.main)
    }

    /// Every alias of the record, in registration order.
    #[must_use]
    pub fn aliases_of(&self, record: RecordRef) -> &[NodeId] {
        self.entries
            .get(&record)
            .map_or(NO_ALIASES, |entry| entry.aliases.as_slice())
    }

    /// Main node plus aliases, main first. The set the change propagator
    /// walks.
    #[must_use]
    pub fn instances_of(&self, record: RecordRef) -> Vec<NodeId> {
        self.entries.get(&record).map_or_else(Vec::new, |entry| {
            let mut instances = Vec::with_capacity(1 + entry.aliases.len());
            instances.push(entry.main);
            instances.extend_from_slice(&entry.aliases);
            instances
        })
    }

    #[must_use]
    pub fn is_registered(&self, record: RecordRef) -> bool {
        self.entries.contains_key(&record)
    }

    /// Drop all bookkeeping for a record. Used on deletion.
    pub fn unregister(&mut self, record: RecordRef) {
        self.entries.remove(&record);
    }

    /// Number of distinct registered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResourceId;

    fn record(n: u32) -> RecordRef {
        RecordRef::state(ResourceId(0), n)
    }

    #[test]
    fn test_first_registration_wins_main() {
        let mut registry = Registry::new();

        assert!(registry.register(record(0), NodeId(10)));
        assert!(!registry.register(record(0), NodeId(11)));
        assert!(!registry.register(record(0), NodeId(12)));

        assert_eq!(registry.main_of(record(0)), Some(NodeId(10)));
        assert_eq!(registry.aliases_of(record(0)), &[NodeId(11), NodeId(12)]);
        assert_eq!(
            registry.instances_of(record(0)),
            vec![NodeId(10), NodeId(11), NodeId(12)]
        );
    }

    #[test]
    fn test_distinct_records_are_independent() {
        let mut registry = Registry::new();
        assert!(registry.register(record(0), NodeId(1)));
        assert!(registry.register(record(1), NodeId(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_purges_everything() {
        let mut registry = Registry::new();
        registry.register(record(0), NodeId(1));
        registry.register(record(0), NodeId(2));

        registry.unregister(record(0));

        assert!(!registry.is_registered(record(0)));
        assert_eq!(registry.main_of(record(0)), None);
        assert!(registry.aliases_of(record(0)).is_empty());
        // A fresh registration starts a new main.
        assert!(registry.register(record(0), NodeId(3)));
    }
}
