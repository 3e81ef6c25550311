//! # dlgtree
//!
//! Dialogue-graph materializer for Infinity Engine style DLG resources.
//!
//! A dialogue corpus is a cyclic directed graph of *states* and *responses*
//! scattered across independently-loaded resources that reference each
//! other by name. This crate turns that graph into a displayable,
//! lazily-expanded tree: cycles collapse into non-expanding alias nodes,
//! dangling references surface as sentinel leaves instead of failures, and
//! records nothing in the corpus refers to are discovered and filed under
//! synthetic orphan containers.
//!
//! Decoding the binary on-disk formats, rendering, and writing edits back
//! are all out of scope: stores and providers are traits an editor adapts
//! to its own I/O layer, and rendering layers mirror the tree through
//! change notifications.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use dlgtree::catalog::{MemoryProvider, ResourceCatalog};
//! use dlgtree::record::{ResponseFlags, ResponseRecord, StateRecord, StrRef};
//! use dlgtree::store::MemoryStore;
//! use dlgtree::tree::{DlgTree, TreeConfig};
//!
//! // One resource with a single entry state and a terminating response.
//! let store = MemoryStore::new("GREET.DLG");
//! store.put_state(StateRecord {
//!     number: 0,
//!     text: StrRef(100),
//!     first_response: 0,
//!     response_count: 1,
//!     trigger: None,
//! });
//! store.put_response(ResponseRecord {
//!     number: 0,
//!     flags: ResponseFlags::new(ResponseFlags::HAS_TEXT | ResponseFlags::TERMINATES),
//!     text: StrRef(101),
//!     journal: StrRef(0),
//!     trigger: None,
//!     action: None,
//!     target: None,
//! });
//!
//! let provider = MemoryProvider::new().with(Arc::new(store));
//! let catalog = ResourceCatalog::new(Box::new(provider));
//! let mut tree = DlgTree::open(catalog, "GREET.DLG", TreeConfig::default())?;
//!
//! let dialogue = tree.children(tree.root())?[0];
//! let state = tree.children(dialogue)?[0];
//! let response = tree.children(state)?[0];
//! assert_eq!(tree.label(state)?, "State 0");
//! assert!(tree.node(response)?.is_leaf());
//! # Ok::<(), dlgtree::Error>(())
//! ```
//!
//! ## Mutation
//!
//! Entry stores publish record mutations over a channel; a
//! [`ChangePropagator`](tree::ChangePropagator) drains them and notifies
//! every tree instance of the affected record:
//!
//! ```ignore
//! let mut propagator = ChangePropagator::new();
//! propagator.watch(&*store);
//! propagator.add_observer(Box::new(my_observer));
//! // ... after edits:
//! propagator.pump(&mut tree);
//! ```

pub mod catalog;
pub mod error;
pub mod record;
pub mod store;
pub mod tree;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::catalog::{MemoryProvider, ResourceCatalog, ResourceProvider};
    pub use crate::error::{Error, Result};
    pub use crate::record::{
        RecordRef, RecordSlot, ResourceId, ResponseFlags, ResponseRecord, ResponseTarget,
        StateRecord, StrRef,
    };
    pub use crate::store::{EntryStore, MemoryStore, RecordChange, StoreEvent};
    pub use crate::tree::{
        AliasPolicy, BulkMode, CancelToken, ChangePropagator, DlgTree, EventLog, Node, NodeIcon,
        NodeId, NodeKind, TreeConfig, TreeEvent, TreeObserver, TreePath,
    };
}
