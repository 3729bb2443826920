//! Predicate contract and evaluation context
//!
//! A predicate decides, from the event history, whether an achievement's
//! condition currently holds. Predicates only read their snapshot; the one
//! side channel they get is [`EvalContext::record_aux`], which appends a
//! synthetic event to the live log for predicates evaluated later in the
//! same pass.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::events::Event;

/// Failure raised by a predicate. The evaluator logs it and retries the
/// rule on the next recorded event; it never reaches the caller of
/// `record_event`.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PredicateError(pub String);

impl PredicateError {
    /// Build an error from anything displayable.
    pub fn msg(message: impl ToString) -> Self {
        Self(message.to_string())
    }
}

/// Shared, thread-safe predicate function.
pub type Predicate =
    Arc<dyn Fn(&EvalContext<'_>) -> Result<bool, PredicateError> + Send + Sync>;

/// Read-only view handed to a predicate for one evaluation.
///
/// `events` is a copy taken when the evaluation started, so concurrent
/// appends cannot disturb the predicate mid-flight. The registration
/// timestamp is snapshotted at the same moment.
pub struct EvalContext<'a> {
    events: &'a [Event],
    registered_at: Option<u64>,
    aux: &'a dyn Fn(&str, Option<Value>),
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(
        events: &'a [Event],
        registered_at: Option<u64>,
        aux: &'a dyn Fn(&str, Option<Value>),
    ) -> Self {
        Self {
            events,
            registered_at,
            aux,
        }
    }

    /// The event history snapshot, oldest first.
    pub fn events(&self) -> &[Event] {
        self.events
    }

    /// Timestamp of the distinguished registration event, if one was
    /// recorded this session.
    pub fn registered_at(&self) -> Option<u64> {
        self.registered_at
    }

    /// True if any event with this name is in the snapshot.
    pub fn seen(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }

    /// How many events with this name are in the snapshot.
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name == name).count()
    }

    /// Earliest event with this name, if any.
    pub fn first(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Latest event with this name, if any.
    pub fn last(&self, name: &str) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.name == name)
    }

    /// Append a synthetic event to the live log.
    ///
    /// The event lands in the real log (with eviction applied) and is
    /// visible to predicates evaluated after this one in the same pass.
    /// It does not trigger a new evaluation pass and does not touch the
    /// registration timestamp, even if it reuses that event name.
    pub fn record_aux(&self, name: &str, payload: Option<Value>) {
        (self.aux)(name, payload);
    }
}
