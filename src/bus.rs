//! Optional event-bus bridge
//!
//! The engine works identically with no bus attached. When a host wires
//! one in, recorded events flow out to the bus, and application events
//! the bus carries flow back into the engine without echoing out again.

use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::engine::{AchievementEngine, Event};

/// Failure to hand an event to the outside. The engine logs these and
/// carries on; recording never depends on the bus accepting.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BusError(pub String);

impl BusError {
    /// Build an error from anything displayable.
    pub fn msg(message: impl ToString) -> Self {
        Self(message.to_string())
    }
}

/// A host event channel the engine can forward to and subscribe on.
pub trait EventBus: Send + Sync {
    /// Deliver an engine-recorded event to the outside. Best-effort.
    fn publish(&self, event: &Event) -> Result<(), BusError>;

    /// Hand the bus a sink for feeding application events back into the
    /// engine. Publish-only buses can ignore this.
    fn subscribe(&self, sink: BusSink) {
        let _ = sink;
    }
}

/// Inbound half of a bus attachment: delivers bus events into the engine.
///
/// Holds the engine weakly; a bus that outlives its engine delivers into
/// the void rather than keeping the engine around.
#[derive(Clone)]
pub struct BusSink {
    engine: Weak<AchievementEngine>,
}

impl BusSink {
    fn new(engine: Weak<AchievementEngine>) -> Self {
        Self { engine }
    }

    /// Record one bus event. Events delivered here are not forwarded back
    /// out to the bus.
    pub fn deliver(&self, name: &str, payload: Option<Value>) {
        if let Some(engine) = self.engine.upgrade() {
            engine.record_from_bus(name, payload);
        }
    }
}

/// Wire an engine and a bus together in both directions.
pub fn attach(engine: &Arc<AchievementEngine>, bus: Arc<dyn EventBus>) {
    bus.subscribe(BusSink::new(Arc::downgrade(engine)));
    engine.set_bus(bus);
}

/// In-process bus: fans announced application events to subscribed sinks
/// and keeps published events for consumers to drain.
#[derive(Default)]
pub struct LocalBus {
    sinks: Mutex<Vec<BusSink>>,
    published: Mutex<Vec<Event>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce an application event to every subscribed sink.
    pub fn announce(&self, name: &str, payload: Option<Value>) {
        let sinks: Vec<BusSink> = self.sinks.lock().clone();
        for sink in &sinks {
            sink.deliver(name, payload.clone());
        }
    }

    /// Take everything published by attached engines so far.
    pub fn drain_published(&self) -> Vec<Event> {
        mem::take(&mut *self.published.lock())
    }
}

impl EventBus for LocalBus {
    fn publish(&self, event: &Event) -> Result<(), BusError> {
        self.published.lock().push(event.clone());
        Ok(())
    }

    fn subscribe(&self, sink: BusSink) {
        self.sinks.lock().push(sink);
    }
}
