//! Orphan scanner: referrer search across the resource corpus
//!
//! Called for a record no already-attached branch reaches. The scanner
//! either proves the record reachable by finding a referring link somewhere
//! in the corpus, or exhausts every dialogue resource and files the record
//! under the matching orphan container.
//!
//! The search works backward: for a target state it first computes the set
//! of same-resource ancestor states (any of which, attached anywhere, would
//! make the target reachable), then looks for a response referencing any of
//! them - cheaply in already-loaded stores first, then across the full
//! catalog enumeration, each resource scanned at most once per lookup.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::catalog::canonical;
use crate::error::{Error, Result};
use crate::record::{RecordRef, RecordSlot, ResourceId};
use crate::store::EntryStore;
use crate::tree::materializer::DlgTree;
use crate::tree::node::NodeId;
use crate::tree::worker::CancelToken;

/// Classify an unreached record: find and materialize a referring chain, or
/// attach the record as an orphan.
pub(crate) fn resolve_unreachable(
    tree: &mut DlgTree,
    record: RecordRef,
    token: &CancelToken,
) -> Result<Option<NodeId>> {
    match record.slot {
        RecordSlot::State(number) => resolve_state(tree, record, number, token),
        RecordSlot::Response(number) => resolve_response(tree, record, number, token),
    }
}

/// Same-resource states from which `state` is reachable, including `state`
/// itself.
///
/// Computed as a backward fixpoint: a state joins the set when any response
/// in its declared range targets a member within the same resource.
pub(crate) fn ancestor_states(
    store: &dyn EntryStore,
    state: u32,
    resource_name: &str,
) -> HashSet<u32> {
    let resource = canonical(resource_name);
    let states: Vec<_> = store
        .state_numbers()
        .into_iter()
        .filter_map(|number| store.state(number))
        .collect();

    let mut ancestors = HashSet::from([state]);
    let mut grew = true;
    while grew {
        grew = false;
        for candidate in &states {
            if ancestors.contains(&candidate.number) {
                continue;
            }
            let targets_member = candidate.response_range().any(|index| {
                store
                    .response(index)
                    .and_then(|response| response.target)
                    .is_some_and(|target| {
                        canonical(&target.resource) == resource
                            && ancestors.contains(&target.state)
                    })
            });
            if targets_member {
                ancestors.insert(candidate.number);
                grew = true;
            }
        }
    }
    ancestors
}

/// Whether any response in `store` targets a member of `ancestors` in the
/// named resource. The per-store sweep is data-parallel; stores are
/// read-only here.
fn store_references(
    store: &dyn EntryStore,
    target_resource: &str,
    ancestors: &HashSet<u32>,
) -> bool {
    store.response_numbers().par_iter().any(|number| {
        store
            .response(*number)
            .and_then(|response| response.target)
            .is_some_and(|target| {
                canonical(&target.resource) == target_resource
                    && ancestors.contains(&target.state)
            })
    })
}

fn resolve_state(
    tree: &mut DlgTree,
    record: RecordRef,
    number: u32,
    token: &CancelToken,
) -> Result<Option<NodeId>> {
    let Some(store) = tree.catalog().get(record.resource) else {
        return Ok(None);
    };
    let Some(resource_name) = tree.catalog().name_of(record.resource).map(str::to_string)
    else {
        return Ok(None);
    };

    let ancestors = ancestor_states(&*store, number, &resource_name);
    tracing::debug!(
        resource = %resource_name,
        state = number,
        ancestors = ancestors.len(),
        "searching corpus for a referrer"
    );

    // The target's own store cannot produce a live referrer: any of its
    // states targeting an ancestor is, by the fixpoint, an ancestor itself.
    let mut scanned: HashSet<String> = HashSet::from([resource_name.clone()]);

    // Tier 1: stores browsing has already pulled in.
    let loaded: Vec<(ResourceId, Arc<dyn EntryStore>)> = tree
        .catalog()
        .loaded()
        .map(|(id, store)| (id, Arc::clone(store)))
        .collect();
    for (candidate_id, candidate) in loaded {
        if let Some(found) = scan_candidate(
            tree,
            record,
            &resource_name,
            &ancestors,
            candidate_id,
            &candidate,
            &mut scanned,
            token,
        )? {
            return Ok(Some(found));
        }
    }

    // Tier 2: everything else the catalog can enumerate, loaded on demand.
    for name in tree.catalog().enumerate() {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if scanned.contains(&name) {
            continue;
        }
        let (candidate_id, candidate) = match tree.catalog_mut().resolve(&name) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(resource = %name, error = %err, "skipping unloadable resource");
                scanned.insert(name);
                continue;
            }
        };
        if let Some(found) = scan_candidate(
            tree,
            record,
            &resource_name,
            &ancestors,
            candidate_id,
            &candidate,
            &mut scanned,
            token,
        )? {
            return Ok(Some(found));
        }
    }

    tracing::debug!(resource = %resource_name, state = number, "no referrer in corpus, filing as orphan");
    Ok(Some(tree.attach_orphan(record)))
}

/// Scan one candidate store; on a referrer hit, attach the candidate's
/// dialogue root and retry the frontier search from the top.
fn scan_candidate(
    tree: &mut DlgTree,
    record: RecordRef,
    target_resource: &str,
    ancestors: &HashSet<u32>,
    candidate_id: ResourceId,
    candidate: &Arc<dyn EntryStore>,
    scanned: &mut HashSet<String>,
    token: &CancelToken,
) -> Result<Option<NodeId>> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let name = canonical(candidate.name());
    if !scanned.insert(name.clone()) {
        return Ok(None);
    }
    if !store_references(&**candidate, target_resource, ancestors) {
        return Ok(None);
    }

    tracing::debug!(referrer = %name, "referrer found, materializing chain");
    tree.ensure_dialogue_root(candidate_id);
    // The referring state may itself be unreachable; a miss here just means
    // the scan continues with the remaining resources.
    tree.frontier_search(record, tree.root(), token)
}

fn resolve_response(
    tree: &mut DlgTree,
    record: RecordRef,
    number: u32,
    token: &CancelToken,
) -> Result<Option<NodeId>> {
    let Some(store) = tree.catalog().get(record.resource) else {
        return Ok(None);
    };
    // A response's only possible referrer is a same-resource state whose
    // declared range covers it.
    let owner = store
        .state_numbers()
        .into_iter()
        .filter_map(|state_number| store.state(state_number))
        .find(|state| state.response_range().contains(&number));

    let Some(owner) = owner else {
        tracing::debug!(response = number, "no state claims this response, filing as orphan");
        return Ok(Some(tree.attach_orphan(record)));
    };

    let Some(resource_name) = tree.catalog().name_of(record.resource).map(str::to_string)
    else {
        return Ok(None);
    };
    let located =
        tree.locate_cancellable(&resource_name, RecordSlot::State(owner.number), token)?;
    let Some(owner_node) = located else {
        return Ok(None);
    };

    // Expanding the owner registers its responses, ours included - unless
    // the owner's range was materialized before this response existed, in
    // which case only a re-materialization would surface it.
    tree.children(owner_node)?;
    let found = tree.registry().main_of(record);
    if found.is_none() {
        tracing::debug!(
            response = number,
            owner = owner.number,
            "owner already materialized without this response"
        );
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ResponseFlags, ResponseRecord, ResponseTarget, StateRecord, StrRef};
    use crate::store::MemoryStore;

    fn state(number: u32, first_response: u32, count: u32) -> StateRecord {
        StateRecord {
            number,
            text: StrRef(0),
            first_response,
            response_count: count,
            trigger: Some(1),
        }
    }

    fn response_to(number: u32, resource: &str, state: u32) -> ResponseRecord {
        ResponseRecord {
            number,
            flags: ResponseFlags::new(ResponseFlags::HAS_TEXT),
            text: StrRef(0),
            journal: StrRef(0),
            trigger: None,
            action: None,
            target: Some(ResponseTarget {
                resource: resource.to_string(),
                state,
            }),
        }
    }

    #[test]
    fn test_ancestor_set_follows_chains_backward() {
        // 0 -> 1 -> 2, and 3 off on its own.
        let store = MemoryStore::new("CHAIN.DLG");
        store.put_state(state(0, 0, 1));
        store.put_state(state(1, 1, 1));
        store.put_state(state(2, 2, 0));
        store.put_state(state(3, 3, 0));
        store.put_response(response_to(0, "CHAIN.DLG", 1));
        store.put_response(response_to(1, "CHAIN.DLG", 2));

        let ancestors = ancestor_states(&store, 2, "CHAIN.DLG");
        assert_eq!(ancestors, HashSet::from([0, 1, 2]));

        let ancestors = ancestor_states(&store, 3, "chain.dlg");
        assert_eq!(ancestors, HashSet::from([3]));
    }

    #[test]
    fn test_ancestor_set_handles_cycles() {
        // 0 <-> 1 mutual cycle feeding 2.
        let store = MemoryStore::new("LOOP.DLG");
        store.put_state(state(0, 0, 2));
        store.put_state(state(1, 2, 1));
        store.put_state(state(2, 3, 0));
        store.put_response(response_to(0, "LOOP.DLG", 1));
        store.put_response(response_to(1, "LOOP.DLG", 2));
        store.put_response(response_to(2, "LOOP.DLG", 0));

        let ancestors = ancestor_states(&store, 2, "LOOP.DLG");
        assert_eq!(ancestors, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn test_store_references_matches_case_insensitively() {
        let store = MemoryStore::new("OTHER.DLG");
        store.put_state(state(0, 0, 1));
        store.put_response(response_to(0, "target.dlg", 5));

        assert!(store_references(&store, "TARGET.DLG", &HashSet::from([5])));
        assert!(!store_references(&store, "TARGET.DLG", &HashSet::from([6])));
        assert!(!store_references(&store, "ELSEWHERE.DLG", &HashSet::from([5])));
    }
}
