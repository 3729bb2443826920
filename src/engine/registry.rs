//! Rule registry
//!
//! Maps achievement ids to display metadata and an unlock predicate.
//! Populated at startup from a rule catalog; rules are never removed
//! during a session, and only their description visibility ever changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::predicate::Predicate;

/// Display metadata for an achievement.
///
/// `description_visible: None` means "inherit the engine default at
/// registration time"; after registration the flag is always concrete, and
/// it is forced to `true` the moment the achievement unlocks so a hidden
/// description becomes readable post-unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementMeta {
    /// Short display title.
    pub title: String,
    /// Longer description shown in galleries and toasts.
    pub description: String,
    /// Whether the description may be shown pre-unlock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_visible: Option<bool>,
}

impl AchievementMeta {
    /// Metadata with default visibility (resolved at registration).
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            description_visible: None,
        }
    }

    /// Explicitly set description visibility.
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.description_visible = Some(visible);
        self
    }

    /// Mark the description hidden until unlock.
    pub fn hidden(self) -> Self {
        self.with_visibility(false)
    }

    /// Resolved visibility; unresolved metadata defaults to visible.
    pub fn is_description_visible(&self) -> bool {
        self.description_visible.unwrap_or(true)
    }
}

/// Read-only snapshot of one registered rule, safe to hand to UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAchievement {
    /// Achievement id.
    pub id: String,
    /// Copy of the display metadata (visibility resolved).
    pub meta: AchievementMeta,
    /// Whether the achievement is currently unlocked.
    pub unlocked: bool,
}

/// One registered rule: metadata plus its predicate.
pub(crate) struct Rule {
    pub(crate) meta: AchievementMeta,
    pub(crate) predicate: Predicate,
}

/// Id-ordered collection of registered rules.
pub(crate) struct Registry {
    rules: BTreeMap<String, Rule>,
    default_visible: bool,
}

impl Registry {
    pub(crate) fn new(default_visible: bool) -> Self {
        Self {
            rules: BTreeMap::new(),
            default_visible,
        }
    }

    /// Register a rule. Returns `false` (and changes nothing) if the id is
    /// already taken; duplicate registration is tolerated, not fatal.
    pub(crate) fn insert(&mut self, id: &str, mut meta: AchievementMeta, predicate: Predicate) -> bool {
        if self.rules.contains_key(id) {
            return false;
        }
        // resolve inherited visibility against the current default
        if meta.description_visible.is_none() {
            meta.description_visible = Some(self.default_visible);
        }
        self.rules.insert(id.to_string(), Rule { meta, predicate });
        true
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub(crate) fn predicate_of(&self, id: &str) -> Option<Predicate> {
        self.rules.get(id).map(|rule| Arc::clone(&rule.predicate))
    }

    pub(crate) fn meta_of(&self, id: &str) -> Option<AchievementMeta> {
        self.rules.get(id).map(|rule| rule.meta.clone())
    }

    /// Ids of every registered rule, in id order.
    pub(crate) fn ids(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Default visibility applied to future registrations.
    pub(crate) fn set_default_visible(&mut self, visible: bool) {
        self.default_visible = visible;
    }

    /// Override one rule's visibility. Returns `false` for unknown ids.
    pub(crate) fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        match self.rules.get_mut(id) {
            Some(rule) => {
                rule.meta.description_visible = Some(visible);
                true
            }
            None => false,
        }
    }

    /// Force a rule's description visible and return its metadata.
    /// Called on unlock; unknown ids return `None`.
    pub(crate) fn reveal(&mut self, id: &str) -> Option<AchievementMeta> {
        self.rules.get_mut(id).map(|rule| {
            rule.meta.description_visible = Some(true);
            rule.meta.clone()
        })
    }

    /// Snapshot every registered rule with its unlocked flag.
    pub(crate) fn snapshot(&self, unlocked: &BTreeSet<String>) -> Vec<RegisteredAchievement> {
        self.rules
            .iter()
            .map(|(id, rule)| RegisteredAchievement {
                id: id.clone(),
                meta: rule.meta.clone(),
                unlocked: unlocked.contains(id),
            })
            .collect()
    }
}
