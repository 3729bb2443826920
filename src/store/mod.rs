//! Durable profile storage
//!
//! A small string key-value store holds the two persisted collections: the
//! unlocked-achievement ids and the ids that have already shown a toast.
//! All writes are best-effort; a storage failure never aborts the in-memory
//! state change that triggered it.

pub mod file;

use std::collections::BTreeSet;

use thiserror::Error;

pub use file::{JsonFileStore, MemoryStore};

/// Storage key for the unlocked-achievement id set.
pub const UNLOCKED_KEY: &str = "accolade.unlocked";
/// Storage key for the already-toasted id set.
pub const TOASTED_KEY: &str = "accolade.toasted";

/// Storage failure. Callers log these and carry on; persistence is never
/// allowed to block unlocking or display.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage serialization error: {0}")]
    Serialize(String),
}

/// Synchronous string key-value store for one player profile.
pub trait ProfileStore: Send + Sync {
    /// Read the value for `key`, or `None` if absent/unreadable.
    fn get(&self, key: &str) -> Option<String>;
    /// Write `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Delete `key` if present.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Persist an id set as a JSON array of strings.
///
/// Failures are logged and reported as `false`; the caller's in-memory set
/// stays authoritative either way.
pub fn save_id_set(store: &dyn ProfileStore, key: &str, ids: &BTreeSet<String>) -> bool {
    let list: Vec<&str> = ids.iter().map(String::as_str).collect();
    let json = match serde_json::to_string(&list) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("could not serialize {key}: {e}");
            return false;
        }
    };
    match store.set(key, &json) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("could not persist {key}: {e}");
            false
        }
    }
}

/// Load an id set persisted by [`save_id_set`].
///
/// Tolerant by contract: a missing key or corrupt value yields an empty
/// set, and ids stored as JSON numbers (older writers were loose about
/// this) are normalized to strings.
pub fn load_id_set(store: &dyn ProfileStore, key: &str) -> BTreeSet<String> {
    let Some(raw) = store.get(key) else {
        return BTreeSet::new();
    };
    let parsed: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("ignoring corrupt value under {key}: {e}");
            return BTreeSet::new();
        }
    };
    let Some(items) = parsed.as_array() else {
        log::warn!("ignoring non-array value under {key}");
        return BTreeSet::new();
    };

    let mut ids = BTreeSet::new();
    for item in items {
        match item {
            serde_json::Value::String(s) => {
                ids.insert(s.clone());
            }
            serde_json::Value::Number(n) => {
                ids.insert(n.to_string());
            }
            other => {
                log::debug!("skipping non-id entry under {key}: {other}");
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn round_trips_string_ids() {
        let store = MemoryStore::default();
        let ids = set_of(&["first_scene", "sapper", "sharp_mind"]);
        assert!(save_id_set(&store, UNLOCKED_KEY, &ids));
        assert_eq!(load_id_set(&store, UNLOCKED_KEY), ids);
    }

    #[test]
    fn normalizes_numeric_ids_to_strings() {
        let store = MemoryStore::default();
        store.set(UNLOCKED_KEY, r#"[7, "sapper", 12.5]"#).unwrap();
        let ids = load_id_set(&store, UNLOCKED_KEY);
        assert_eq!(ids, set_of(&["7", "12.5", "sapper"]));
    }

    #[test]
    fn missing_and_corrupt_values_read_as_empty() {
        let store = MemoryStore::default();
        assert!(load_id_set(&store, TOASTED_KEY).is_empty());

        store.set(TOASTED_KEY, "{not json").unwrap();
        assert!(load_id_set(&store, TOASTED_KEY).is_empty());

        store.set(TOASTED_KEY, r#"{"an":"object"}"#).unwrap();
        assert!(load_id_set(&store, TOASTED_KEY).is_empty());
    }

    #[test]
    fn skips_unusable_entries_but_keeps_the_rest() {
        let store = MemoryStore::default();
        store
            .set(UNLOCKED_KEY, r#"["keep", null, ["nested"], "also"]"#)
            .unwrap();
        assert_eq!(
            load_id_set(&store, UNLOCKED_KEY),
            set_of(&["also", "keep"])
        );
    }
}
