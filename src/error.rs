//! Error types for `dlgtree`
//!
//! Structural problems inside the dialogue graph - missing records,
//! unresolvable cross-resource links, ragged response ranges - are never
//! errors here: they materialize as sentinel nodes so a single broken link
//! cannot fail a whole traversal. `Error` covers resource loading and caller
//! contract violations only.

use thiserror::Error;

use crate::tree::node::NodeId;

/// The error type for `dlgtree` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from a resource provider.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog's provider does not know the requested resource name.
    #[error("resource not found: {name}")]
    ResourceNotFound {
        /// The requested resource name.
        name: String,
    },

    /// The provider recognized the resource but failed to load it.
    #[error("failed to load resource {name}: {reason}")]
    ResourceLoad {
        /// The resource name.
        name: String,
        /// Provider-supplied failure description.
        reason: String,
    },

    /// Children were requested from a node that does not allow them.
    ///
    /// Callers must check `allows_children` first; sentinels, terminating
    /// responses and (under the redirect policy) aliases never expand.
    #[error("node {id} does not allow children")]
    NotExpandable {
        /// The offending node.
        id: NodeId,
    },

    /// The node id does not name a live node of this tree.
    #[error("unknown or removed node: {id}")]
    UnknownNode {
        /// The offending node.
        id: NodeId,
    },

    /// A cancellable operation was cancelled before completing.
    ///
    /// Bulk expand/collapse never reports this - it simply stops, leaving
    /// partially populated caches valid. Only `locate_cancellable` does,
    /// because a cancelled search has no usable answer.
    #[error("operation cancelled")]
    Cancelled,
}

/// A specialized Result type for `dlgtree` operations.
pub type Result<T> = std::result::Result<T, Error>;
