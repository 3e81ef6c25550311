//! Change propagation: keeping every alias of a mutated record consistent
//!
//! Subscribes to entry-store mutation streams and re-broadcasts structural
//! changes to tree observers, once per attached instance of the affected
//! record. Runs on the thread that owns the tree: events queue in the
//! channel until [`ChangePropagator::pump`] drains them.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use crate::record::RecordRef;
use crate::store::{EntryStore, RecordChange, StoreEvent};
use crate::tree::materializer::DlgTree;
use crate::tree::node::TreePath;

/// Structural notification delivered to tree observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A node's displayed content changed.
    Changed {
        /// Path from the root to the changed node.
        path: TreePath,
    },
    /// A node was removed from its parent's child list.
    Removed {
        /// Path from the root to the former parent.
        parent_path: TreePath,
        /// Index the node occupied before removal.
        index: usize,
    },
    /// A node was inserted into its parent's child list.
    Inserted {
        /// Path from the root to the parent.
        parent_path: TreePath,
        /// Index of the new node.
        index: usize,
    },
}

/// Observer a rendering layer registers to mirror tree structure.
pub trait TreeObserver: Send {
    fn node_changed(&mut self, path: &TreePath);
    fn node_removed(&mut self, parent_path: &TreePath, index: usize);
    fn node_inserted(&mut self, parent_path: &TreePath, index: usize);
}

/// Subscribes to entry stores and re-broadcasts mutations to observers.
pub struct ChangePropagator {
    tx: Sender<StoreEvent>,
    rx: Receiver<StoreEvent>,
    observers: Vec<Box<dyn TreeObserver>>,
}

impl Default for ChangePropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangePropagator {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            observers: Vec::new(),
        }
    }

    /// Subscribe to a store's mutation stream.
    pub fn watch(&self, store: &dyn EntryStore) {
        store.subscribe(self.tx.clone());
    }

    /// Register a tree observer.
    pub fn add_observer(&mut self, observer: Box<dyn TreeObserver>) {
        self.observers.push(observer);
    }

    /// Drain pending store mutations, apply them to the tree and notify
    /// observers. Returns the number of tree events dispatched.
    ///
    /// Also flushes structural notifications the materializer produced on
    /// its own (lazily attached dialogue roots, orphan attachments).
    pub fn pump(&mut self, tree: &mut DlgTree) -> usize {
        let mut events = tree.take_events();
        while let Ok(event) = self.rx.try_recv() {
            apply(tree, &event, &mut events);
        }
        events.extend(tree.take_events());

        for event in &events {
            for observer in &mut self.observers {
                match event {
                    TreeEvent::Changed { path } => observer.node_changed(path),
                    TreeEvent::Removed { parent_path, index } => {
                        observer.node_removed(parent_path, *index);
                    }
                    TreeEvent::Inserted { parent_path, index } => {
                        observer.node_inserted(parent_path, *index);
                    }
                }
            }
        }
        events.len()
    }
}

/// Map one store mutation onto tree events.
fn apply(tree: &mut DlgTree, event: &StoreEvent, out: &mut Vec<TreeEvent>) {
    let Some(resource) = tree.catalog().id_of(&event.resource) else {
        // Mutation in a resource this tree never loaded; nothing displays it.
        return;
    };
    match event.change {
        RecordChange::Changed(slot) => {
            push_changed(tree, RecordRef { resource, slot }, out);
        }
        RecordChange::Removed(slot) => {
            let record = RecordRef { resource, slot };
            for id in tree.registry().instances_of(record) {
                // Instances hidden by an earlier structural removal get no
                // notification; they are not in any displayed child list.
                let attached = tree.is_attached(id);
                let detached = tree.detach_instance(id);
                if attached {
                    if let Some((parent_path, index)) = detached {
                        out.push(TreeEvent::Removed { parent_path, index });
                    }
                }
            }
            tree.unregister_record(record);
        }
        RecordChange::Inserted(slot) => {
            let record = RecordRef { resource, slot };
            // Best-effort: an insertion into an already-visible range reads
            // as a content change; anything else waits for a full
            // re-materialization.
            if tree.registry().is_registered(record) {
                push_changed(tree, record, out);
            } else {
                tracing::debug!(resource = %event.resource, slot = %slot, "insertion outside visible ranges ignored");
            }
        }
    }
}

fn push_changed(tree: &DlgTree, record: RecordRef, out: &mut Vec<TreeEvent>) {
    for id in tree.attached_instances(record) {
        if let Ok(path) = tree.path(id) {
            out.push(TreeEvent::Changed { path });
        }
    }
}

/// Observer that records events for inspection. Intended for tests and
/// debugging; clones share one log.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TreeEvent>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<TreeEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: TreeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl TreeObserver for EventLog {
    fn node_changed(&mut self, path: &TreePath) {
        self.push(TreeEvent::Changed { path: path.clone() });
    }

    fn node_removed(&mut self, parent_path: &TreePath, index: usize) {
        self.push(TreeEvent::Removed {
            parent_path: parent_path.clone(),
            index,
        });
    }

    fn node_inserted(&mut self, parent_path: &TreePath, index: usize) {
        self.push(TreeEvent::Inserted {
            parent_path: parent_path.clone(),
            index,
        });
    }
}
