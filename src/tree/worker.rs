//! Background bulk traversal with cooperative cancellation
//!
//! Bulk expand/collapse and full-corpus locates can take long enough to
//! deserve a worker thread. The worker only ever *reads* the graph -
//! expanding nodes, which populates caches as a side effect - and polls a
//! shared cancellation flag between node visits. Partial expansion is safe:
//! whatever was populated before cancellation stays cached and valid.
//!
//! The tree is shared behind a mutex and locked once per visit, so
//! foreground mutations serialize against the worker instead of racing it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::Result;
use crate::record::RecordSlot;
use crate::tree::materializer::DlgTree;
use crate::tree::node::{NodeId, TreePath};

/// Shared cancellation flag, polled cooperatively between node visits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The operation stops at its next poll; nothing
    /// is rolled back.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Direction of a bulk traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Materialize the whole subtree, visiting parents before children.
    Expand,
    /// Walk only already-materialized children, visiting children before
    /// parents. Materializes nothing.
    Collapse,
}

/// Bulk-visit a subtree, calling `on_visit` with the path of every node
/// reached. Returns the number of nodes visited.
///
/// In expand mode the traversal descends through containers and main nodes
/// only - aliases and sentinels are visited but never descended into, which
/// keeps the walk finite on cyclic dialogues regardless of alias policy.
pub fn bulk_visit(
    tree: &Mutex<DlgTree>,
    start: NodeId,
    mode: BulkMode,
    token: &CancelToken,
    on_visit: &mut dyn FnMut(&TreePath),
) -> usize {
    match mode {
        BulkMode::Expand => expand_visit(tree, start, token, on_visit),
        BulkMode::Collapse => collapse_visit(tree, start, token, on_visit),
    }
}

fn expand_visit(
    tree: &Mutex<DlgTree>,
    start: NodeId,
    token: &CancelToken,
    on_visit: &mut dyn FnMut(&TreePath),
) -> usize {
    let mut visits = 0;
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        if token.is_cancelled() {
            tracing::debug!(visits, "bulk expand cancelled");
            break;
        }
        if !visited.insert(id) {
            continue;
        }

        let path = {
            let mut tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
            let Ok(path) = tree.path(id) else {
                // Node died between being queued and visited.
                continue;
            };
            let descend = tree
                .node(id)
                .map(|node| node.allows_children() && !node.is_alias())
                .unwrap_or(false);
            if descend {
                if let Ok(children) = tree.children(id) {
                    // Reverse so the stack pops left-to-right.
                    for child in children.iter().rev() {
                        stack.push(*child);
                    }
                }
            }
            path
        };
        on_visit(&path);
        visits += 1;
    }
    visits
}

fn collapse_visit(
    tree: &Mutex<DlgTree>,
    start: NodeId,
    token: &CancelToken,
    on_visit: &mut dyn FnMut(&TreePath),
) -> usize {
    // Collect top-down over cached children, then visit in reverse so
    // children collapse before their parents.
    let mut order: Vec<TreePath> = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        if token.is_cancelled() {
            tracing::debug!("bulk collapse cancelled during collection");
            break;
        }
        if !visited.insert(id) {
            continue;
        }
        let tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
        let Ok(path) = tree.path(id) else {
            continue;
        };
        order.push(path);
        if let Ok(Some(children)) = tree.cached_children(id) {
            for child in children.iter().rev() {
                stack.push(*child);
            }
        }
    }

    for path in order.iter().rev() {
        if token.is_cancelled() {
            break;
        }
        on_visit(path);
    }
    order.len()
}

/// Run a bulk traversal on a worker thread. Returns the join handle; the
/// result is the visit count.
pub fn spawn_bulk<F>(
    tree: Arc<Mutex<DlgTree>>,
    start: NodeId,
    mode: BulkMode,
    token: CancelToken,
    mut on_visit: F,
) -> JoinHandle<usize>
where
    F: FnMut(&TreePath) + Send + 'static,
{
    thread::spawn(move || bulk_visit(&tree, start, mode, &token, &mut on_visit))
}

/// Materialize a whole subtree on a worker thread. Cancellation leaves the
/// partially populated caches valid and reusable.
pub fn expand_all(
    tree: Arc<Mutex<DlgTree>>,
    start: NodeId,
    token: CancelToken,
) -> JoinHandle<usize> {
    spawn_bulk(tree, start, BulkMode::Expand, token, |_path: &TreePath| {})
}

/// Walk the already-materialized part of a subtree children-first on a
/// worker thread, for rendering layers that fold rows up bottom-up.
pub fn collapse_all(
    tree: Arc<Mutex<DlgTree>>,
    start: NodeId,
    token: CancelToken,
) -> JoinHandle<usize> {
    spawn_bulk(tree, start, BulkMode::Collapse, token, |_path: &TreePath| {})
}

/// Run a (possibly full-corpus) locate on a worker thread.
///
/// The tree stays locked for the duration of the call, so foreground work
/// queues behind it; cancel the token to give the foreground the lock back
/// early.
pub fn spawn_locate(
    tree: Arc<Mutex<DlgTree>>,
    resource: String,
    slot: RecordSlot,
    token: CancelToken,
) -> JoinHandle<Result<Option<NodeId>>> {
    thread::spawn(move || {
        let mut tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
        tree.locate_cancellable(&resource, slot, &token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
