//! Entry stores: per-resource containers of dialogue records
//!
//! An [`EntryStore`] holds the state and response tables of one dialogue
//! resource and publishes record mutations to subscribers over a channel.
//! How the records got there (binary parsing, conversion, editing) is the
//! adapter's business; the tree only reads and listens.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::record::{RecordSlot, ResponseRecord, StateRecord};

/// Per-resource container of state and response records.
///
/// Implementations are shared behind `Arc` and read from multiple threads
/// (foreground navigation and the background expansion worker), so lookups
/// take `&self`.
pub trait EntryStore: Send + Sync {
    /// Resource name, e.g. `GREET.DLG`.
    fn name(&self) -> &str;

    /// Look up a state by sequence number.
    fn state(&self, number: u32) -> Option<StateRecord>;

    /// Look up a response by sequence number.
    fn response(&self, number: u32) -> Option<ResponseRecord>;

    /// All state numbers, in declaration order.
    fn state_numbers(&self) -> Vec<u32>;

    /// All response numbers, in declaration order.
    fn response_numbers(&self) -> Vec<u32>;

    /// Register a mutation subscriber.
    ///
    /// Every subsequent record mutation is sent to `tx`. Senders whose
    /// receiving end has gone away are dropped on the next emit.
    fn subscribe(&self, tx: Sender<StoreEvent>);
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    /// Record content changed in place.
    Changed(RecordSlot),
    /// Record was deleted from the store.
    Removed(RecordSlot),
    /// A new record appeared.
    Inserted(RecordSlot),
}

/// A mutation notification from an entry store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Name of the resource the store holds.
    pub resource: String,
    /// The mutation.
    pub change: RecordChange,
}

/// Snapshot of a store's contents, used to seed a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreContents {
    /// States keyed by sequence number.
    pub states: BTreeMap<u32, StateRecord>,
    /// Responses keyed by sequence number.
    pub responses: BTreeMap<u32, ResponseRecord>,
}

struct Inner {
    contents: StoreContents,
    subscribers: Vec<Sender<StoreEvent>>,
}

/// In-memory [`EntryStore`] implementation.
///
/// The reference store for tests and for adapters that decode a whole
/// resource up front. Mutations emit [`StoreEvent`]s to every live
/// subscriber; seeding a store before anyone subscribes is therefore
/// silent.
pub struct MemoryStore {
    name: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store for the given resource name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_contents(name, StoreContents::default())
    }

    /// Create a store seeded with decoded contents.
    #[must_use]
    pub fn with_contents(name: impl Into<String>, contents: StoreContents) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                contents,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Insert or replace a state. Emits `Inserted` or `Changed`.
    pub fn put_state(&self, state: StateRecord) {
        let number = state.number;
        let existed = self.with_inner(|inner| {
            inner.contents.states.insert(number, state).is_some()
        });
        self.emit(if existed {
            RecordChange::Changed(RecordSlot::State(number))
        } else {
            RecordChange::Inserted(RecordSlot::State(number))
        });
    }

    /// Insert or replace a response. Emits `Inserted` or `Changed`.
    pub fn put_response(&self, response: ResponseRecord) {
        let number = response.number;
        let existed = self.with_inner(|inner| {
            inner.contents.responses.insert(number, response).is_some()
        });
        self.emit(if existed {
            RecordChange::Changed(RecordSlot::Response(number))
        } else {
            RecordChange::Inserted(RecordSlot::Response(number))
        });
    }

    /// Delete a state. Emits `Removed` if it existed.
    pub fn remove_state(&self, number: u32) {
        let existed =
            self.with_inner(|inner| inner.contents.states.remove(&number).is_some());
        if existed {
            self.emit(RecordChange::Removed(RecordSlot::State(number)));
        }
    }

    /// Delete a response. Emits `Removed` if it existed.
    pub fn remove_response(&self, number: u32) {
        let existed =
            self.with_inner(|inner| inner.contents.responses.remove(&number).is_some());
        if existed {
            self.emit(RecordChange::Removed(RecordSlot::Response(number)));
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T
    where
        T: Default,
    {
        self.inner.lock().map(|mut inner| f(&mut inner)).unwrap_or_default()
    }

    fn emit(&self, change: RecordChange) {
        let event = StoreEvent {
            resource: self.name.clone(),
            change,
        };
        if let Ok(mut inner) = self.inner.lock() {
            // Drop subscribers whose receiver is gone.
            inner.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

impl EntryStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self, number: u32) -> Option<StateRecord> {
        self.with_inner(|inner| inner.contents.states.get(&number).cloned())
    }

    fn response(&self, number: u32) -> Option<ResponseRecord> {
        self.with_inner(|inner| inner.contents.responses.get(&number).cloned())
    }

    fn state_numbers(&self) -> Vec<u32> {
        self.with_inner(|inner| inner.contents.states.keys().copied().collect())
    }

    fn response_numbers(&self) -> Vec<u32> {
        self.with_inner(|inner| inner.contents.responses.keys().copied().collect())
    }

    fn subscribe(&self, tx: Sender<StoreEvent>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(tx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::record::{ResponseFlags, StrRef};

    fn state(number: u32) -> StateRecord {
        StateRecord {
            number,
            text: StrRef(number),
            first_response: 0,
            response_count: 0,
            trigger: None,
        }
    }

    #[test]
    fn test_lookup_and_numbers() {
        let store = MemoryStore::new("TEST.DLG");
        store.put_state(state(2));
        store.put_state(state(0));

        assert_eq!(store.state_numbers(), vec![0, 2]);
        assert_eq!(store.state(2), Some(state(2)));
        assert_eq!(store.state(1), None);
        assert!(store.response_numbers().is_empty());
    }

    #[test]
    fn test_mutations_notify_subscribers() {
        let store = MemoryStore::new("TEST.DLG");
        store.put_state(state(0));

        let (tx, rx) = mpsc::channel();
        store.subscribe(tx);

        store.put_state(state(0)); // replace -> changed
        store.put_state(state(1)); // new -> inserted
        store.remove_state(0);
        store.remove_state(42); // absent -> silent

        let changes: Vec<_> = rx.try_iter().map(|e| e.change).collect();
        assert_eq!(
            changes,
            vec![
                RecordChange::Changed(RecordSlot::State(0)),
                RecordChange::Inserted(RecordSlot::State(1)),
                RecordChange::Removed(RecordSlot::State(0)),
            ]
        );
    }

    #[test]
    fn test_response_roundtrip() {
        let store = MemoryStore::new("TEST.DLG");
        let response = ResponseRecord {
            number: 3,
            flags: ResponseFlags::new(ResponseFlags::TERMINATES),
            text: StrRef(0),
            journal: StrRef(0),
            trigger: None,
            action: None,
            target: None,
        };
        store.put_response(response.clone());
        assert_eq!(store.response(3), Some(response));
    }
}
