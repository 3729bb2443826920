//! Application events and the bounded event log
//!
//! Scenes report what happened as named events; predicates read the log to
//! decide whether an achievement condition holds.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of events the log retains before evicting the oldest.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// One recorded application event.
///
/// `name` is a free-form namespaced string (e.g. `"scene0:entered_birthday"`).
/// The payload shape is rule-specific; predicates must treat it as untyped
/// and check fields defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Namespaced event name.
    pub name: String,
    /// Optional untyped payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Millisecond timestamp assigned at record time.
    pub timestamp: u64,
}

impl Event {
    /// Create an event with the given name, payload and timestamp.
    pub fn new(name: impl Into<String>, payload: Option<Value>, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp,
        }
    }

    /// Look up a top-level payload field, if the payload is an object.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }
}

/// Capacity-bounded, in-order log of events.
///
/// Append-only within a session except for oldest-first eviction once the
/// capacity is exceeded. Predicates that need unbounded history become
/// unreliable once eviction starts; that is a documented limitation, not a
/// bug.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<Event>,
    capacity: usize,
}

impl EventLog {
    /// Create a log bounded at `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an event, evicting the oldest entry if the log is full.
    pub fn push(&mut self, event: Event) {
        self.entries.push_back(event);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded (or everything was cleared).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    /// Drop every retained event.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}
