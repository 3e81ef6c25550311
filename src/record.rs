//! Record vocabulary for dialogue entry stores
//!
//! States and responses are owned by their [`EntryStore`](crate::store::EntryStore),
//! not by the tree; the tree only keys them through [`RecordRef`]. The on-disk
//! layout these records come from is out of scope here - a store adapter is
//! expected to have decoded them already.

use serde::{Deserialize, Serialize};

/// Reference into the game's external string table.
///
/// Carried opaquely; this crate never resolves it to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StrRef(pub u32);

/// Bit set describing which optional fields of a [`ResponseRecord`] are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseFlags(pub u32);

impl ResponseFlags {
    /// The response carries display text.
    pub const HAS_TEXT: u32 = 0x0001;
    /// The response is gated by a trigger condition.
    pub const HAS_TRIGGER: u32 = 0x0002;
    /// Selecting the response runs an action.
    pub const HAS_ACTION: u32 = 0x0004;
    /// The response ends the dialogue; it has no target state.
    pub const TERMINATES: u32 = 0x0008;
    /// Selecting the response adds a journal entry.
    pub const HAS_JOURNAL: u32 = 0x0010;

    #[must_use]
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    #[must_use]
    pub fn has_text(self) -> bool {
        self.contains(Self::HAS_TEXT)
    }

    #[must_use]
    pub fn has_trigger(self) -> bool {
        self.contains(Self::HAS_TRIGGER)
    }

    #[must_use]
    pub fn has_action(self) -> bool {
        self.contains(Self::HAS_ACTION)
    }

    #[must_use]
    pub fn terminates(self) -> bool {
        self.contains(Self::TERMINATES)
    }

    #[must_use]
    pub fn has_journal(self) -> bool {
        self.contains(Self::HAS_JOURNAL)
    }
}

/// A dialogue state: one line spoken by the non-player side, with an ordered
/// run of outgoing responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Sequence number of the state within its resource.
    pub number: u32,
    /// The state's display text.
    pub text: StrRef,
    /// Index of the first outgoing response in the resource's response table.
    pub first_response: u32,
    /// Number of consecutive outgoing responses.
    pub response_count: u32,
    /// Incoming gate condition index, if any. A state without one is a
    /// dialogue entry point.
    pub trigger: Option<u32>,
}

impl StateRecord {
    /// Response table indices this state claims, in declaration order.
    ///
    /// Indices are not guaranteed to exist in the store; a ragged range is
    /// surfaced per index as broken-reference sentinels during expansion.
    #[must_use]
    pub fn response_range(&self) -> std::ops::Range<u32> {
        self.first_response..self.first_response.saturating_add(self.response_count)
    }

    /// Whether the state is reachable without a prior response.
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        self.trigger.is_none()
    }
}

/// Target of a non-terminating response: a state in a named resource,
/// possibly the response's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTarget {
    /// Target resource name, e.g. `GREET.DLG`. Compared case-insensitively.
    pub resource: String,
    /// Target state number within that resource.
    pub state: u32,
}

/// A dialogue response: one player-side option leading to a next state or
/// ending the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Sequence number of the response within its resource.
    pub number: u32,
    /// Which optional fields are present.
    pub flags: ResponseFlags,
    /// Display text, meaningful when `flags.has_text()`.
    pub text: StrRef,
    /// Journal text, meaningful when `flags.has_journal()`.
    pub journal: StrRef,
    /// Gate condition index, if any.
    pub trigger: Option<u32>,
    /// Action index, if any.
    pub action: Option<u32>,
    /// Next state, absent when the response terminates the dialogue.
    pub target: Option<ResponseTarget>,
}

impl ResponseRecord {
    /// Whether selecting this response ends the dialogue.
    ///
    /// A record whose flags claim a continuation but which carries no target
    /// is treated as terminating rather than broken.
    #[must_use]
    pub fn terminates(&self) -> bool {
        self.flags.terminates() || self.target.is_none()
    }
}

/// Interned identifier of a loaded resource, assigned by the
/// [`ResourceCatalog`](crate::catalog::ResourceCatalog) in load order.
///
/// Stable for the lifetime of the tree that owns the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which record table a [`RecordRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSlot {
    /// A state, by sequence number.
    State(u32),
    /// A response, by sequence number.
    Response(u32),
}

impl std::fmt::Display for RecordSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSlot::State(n) => write!(f, "state {n}"),
            RecordSlot::Response(n) => write!(f, "response {n}"),
        }
    }
}

/// Stable identity of a record across every node that displays it.
///
/// This is the key of the identity registry: two nodes showing the same
/// `RecordRef` are the same underlying record, whatever their positions in
/// the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef {
    /// Resource the record lives in.
    pub resource: ResourceId,
    /// Table and sequence number within that resource.
    pub slot: RecordSlot,
}

impl RecordRef {
    #[must_use]
    pub fn state(resource: ResourceId, number: u32) -> Self {
        Self {
            resource,
            slot: RecordSlot::State(number),
        }
    }

    #[must_use]
    pub fn response(resource: ResourceId, number: u32) -> Self {
        Self {
            resource,
            slot: RecordSlot::Response(number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_flags_bits() {
        let flags = ResponseFlags::new(ResponseFlags::HAS_TEXT | ResponseFlags::TERMINATES);
        assert!(flags.has_text());
        assert!(flags.terminates());
        assert!(!flags.has_trigger());
        assert!(!flags.has_action());
        assert!(!flags.has_journal());
    }

    #[test]
    fn test_response_range() {
        let state = StateRecord {
            number: 0,
            text: StrRef(100),
            first_response: 5,
            response_count: 2,
            trigger: None,
        };
        assert_eq!(state.response_range().collect::<Vec<_>>(), vec![5, 6]);
        assert!(state.is_entry_point());
    }

    #[test]
    fn test_missing_target_terminates() {
        let response = ResponseRecord {
            number: 0,
            flags: ResponseFlags::new(ResponseFlags::HAS_TEXT),
            text: StrRef(1),
            journal: StrRef(0),
            trigger: None,
            action: None,
            target: None,
        };
        assert!(!response.flags.terminates());
        assert!(response.terminates());
    }
}
