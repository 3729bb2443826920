//! Declarative achievement catalog
//!
//! The rule set is data, not code: each entry pairs display metadata with
//! a [`Condition`] that compiles into a predicate. Catalogs are loaded
//! from RON files (see [`loader`]) or built in code, then installed into
//! an engine in one call.

pub mod loader;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{AchievementEngine, AchievementMeta, EvalContext, Predicate};

pub use loader::{export_default, load_or_default, CatalogError, CATALOG_PATH};

/// An expected payload field value. Payloads are untyped JSON, so the
/// comparison is by shape: a string condition never matches a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    fn matches(&self, actual: &Value) -> bool {
        match self {
            FieldValue::Str(expected) => actual.as_str() == Some(expected.as_str()),
            FieldValue::Int(expected) => actual.as_i64() == Some(*expected),
            FieldValue::Float(expected) => actual.as_f64() == Some(*expected),
            FieldValue::Bool(expected) => actual.as_bool() == Some(*expected),
        }
    }
}

/// Unlock condition over the event log.
///
/// Conditions only read the log snapshot, so they are freely composable;
/// a malformed or missing payload field simply fails to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Some event with this name was recorded.
    Seen(String),
    /// At least `count` events with this name were recorded.
    SeenAtLeast { name: String, count: usize },
    /// Some event with this name carries `field` equal to `value`.
    FieldEquals {
        name: String,
        field: String,
        value: FieldValue,
    },
    /// Some event with this name carries a numeric `field` of at least `min`.
    FieldAtLeast {
        name: String,
        field: String,
        min: f64,
    },
    /// Some event with this name landed within `within_ms` of the
    /// registration event. Never holds while no registration timestamp
    /// is pinned.
    WithinOfRegistration { name: String, within_ms: u64 },
    /// The named events were all recorded, in the given order. A name
    /// listed twice must have been recorded twice.
    SeenInOrder(Vec<String>),
    /// Every inner condition holds.
    All(Vec<Condition>),
    /// At least one inner condition holds.
    Any(Vec<Condition>),
    /// The inner condition does not hold.
    Not(Box<Condition>),
}

impl Condition {
    /// Does this condition hold for the given evaluation context?
    pub fn holds(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Condition::Seen(name) => ctx.seen(name),
            Condition::SeenAtLeast { name, count } => ctx.count(name) >= *count,
            Condition::FieldEquals { name, field, value } => ctx
                .events()
                .iter()
                .filter(|e| &e.name == name)
                .any(|e| e.field(field).is_some_and(|v| value.matches(v))),
            Condition::FieldAtLeast { name, field, min } => ctx
                .events()
                .iter()
                .filter(|e| &e.name == name)
                .filter_map(|e| e.field(field).and_then(Value::as_f64))
                .any(|v| v >= *min),
            Condition::WithinOfRegistration { name, within_ms } => {
                let Some(registered) = ctx.registered_at() else {
                    return false;
                };
                ctx.events()
                    .iter()
                    .filter(|e| &e.name == name)
                    .any(|e| e.timestamp >= registered && e.timestamp - registered <= *within_ms)
            }
            Condition::SeenInOrder(names) => {
                let mut wanted = names.iter();
                let mut want = wanted.next();
                for event in ctx.events() {
                    match want {
                        Some(name) if &event.name == name => want = wanted.next(),
                        Some(_) => {}
                        None => break,
                    }
                }
                want.is_none()
            }
            Condition::All(inner) => inner.iter().all(|c| c.holds(ctx)),
            Condition::Any(inner) => inner.iter().any(|c| c.holds(ctx)),
            Condition::Not(inner) => !inner.holds(ctx),
        }
    }

    /// Build the predicate this condition describes.
    pub fn compile(&self) -> Predicate {
        let condition = self.clone();
        Arc::new(move |ctx| Ok(condition.holds(ctx)))
    }
}

/// One catalog row: id, display metadata, unlock condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Hide the description until the achievement unlocks.
    #[serde(default)]
    pub hidden: bool,
    pub condition: Condition,
}

impl CatalogEntry {
    fn meta(&self) -> AchievementMeta {
        let meta = AchievementMeta::new(&self.title, &self.description);
        if self.hidden {
            meta.hidden()
        } else {
            meta
        }
    }
}

/// A loadable set of achievement rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Register every entry with the engine.
    ///
    /// Returns how many rules were actually added; duplicates and entries
    /// with empty ids are skipped with a log line, per the registration
    /// contract.
    pub fn install(&self, engine: &AchievementEngine) -> usize {
        let mut added = 0;
        for entry in &self.entries {
            match engine.register_rule(&entry.id, entry.meta(), entry.condition.compile()) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Skipping catalog entry {:?}: {}", entry.id, e),
            }
        }
        log::info!("Installed {} of {} catalog rules", added, self.entries.len());
        added
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
