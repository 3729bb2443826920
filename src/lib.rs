//! Accolade - an event-driven achievement engine
//!
//! Feed it application events, give it declarative unlock rules,
//! and it takes care of the rest: at-most-once unlocks, persisted
//! state, and batched toast notifications that never show twice.

pub mod audio;
pub mod bus;
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod notify;
pub mod store;

// Re-export commonly used types
pub use catalog::{Catalog, Condition};
pub use engine::{AchievementEngine, AchievementMeta, EngineSettings, UnlockNotice};
pub use store::{JsonFileStore, MemoryStore, ProfileStore};
