//! Dialogue tree materialization
//!
//! Everything that turns the record graph into a displayable tree: the node
//! model, the identity registry, the materializer itself, the orphan
//! scanner, change propagation and the background bulk worker.

mod materializer;
mod orphan;
mod propagate;
mod registry;
mod worker;

pub mod node;

// Primary public API
pub use materializer::{AliasPolicy, DlgTree, TreeConfig};
pub use node::{Node, NodeIcon, NodeId, NodeKind, TreePath};

// Change propagation
pub use propagate::{ChangePropagator, EventLog, TreeEvent, TreeObserver};

// Identity bookkeeping (read access is through `DlgTree`)
pub use registry::Registry;

// Background bulk operations
pub use worker::{
    BulkMode, CancelToken, bulk_visit, collapse_all, expand_all, spawn_bulk, spawn_locate,
};
