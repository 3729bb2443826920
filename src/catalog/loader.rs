//! Catalog loading
//!
//! Loads the achievement catalog from an external RON file, with fallback
//! to the compiled-in defaults. The defaults can be exported to disk for
//! editing.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::{Catalog, CatalogEntry, Condition, FieldValue};

/// Conventional location of the catalog file.
pub const CATALOG_PATH: &str = "assets/catalog.ron";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] ron::Error),
    #[error("failed to write catalog: {0}")]
    Io(#[from] std::io::Error),
}

/// Load a catalog from `path`, or fall back to [`default_catalog`] when
/// the file is missing, unreadable, or malformed. Never fails.
pub fn load_or_default(path: impl AsRef<Path>) -> Catalog {
    let path = path.as_ref();
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match ron::from_str(&content) {
                Ok(catalog) => {
                    log::info!("Loaded achievement catalog from {}", path.display());
                    return catalog;
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e)
                }
            },
            Err(e) => log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e),
        }
    }
    default_catalog()
}

/// Write the default catalog to `path` for easy editing.
pub fn export_default(path: impl AsRef<Path>) -> Result<(), CatalogError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    let text = ron::ser::to_string_pretty(&default_catalog(), ron::ser::PrettyConfig::default())?;
    fs::write(path, text)?;
    Ok(())
}

/// The built-in rule set for the narrative scenes.
pub fn default_catalog() -> Catalog {
    Catalog {
        entries: vec![
            CatalogEntry {
                id: "first-contact".into(),
                title: "First Contact".into(),
                description: "Begin the story".into(),
                hidden: false,
                condition: Condition::Seen("scene0:started".into()),
            },
            CatalogEntry {
                id: "identified".into(),
                title: "You Are You".into(),
                description: "Confirm your identity".into(),
                hidden: false,
                condition: Condition::Seen("scene0:identity_confirmed".into()),
            },
            CatalogEntry {
                id: "quiz-whiz".into(),
                title: "Quiz Whiz".into(),
                description: "Finish the exam with a perfect score".into(),
                hidden: false,
                condition: Condition::FieldAtLeast {
                    name: "scene1:exam_finished".into(),
                    field: "score".into(),
                    min: 100.0,
                },
            },
            CatalogEntry {
                id: "minesweeper-clear".into(),
                title: "Calm Under Pressure".into(),
                description: "Clear the minefield without a single detonation".into(),
                hidden: false,
                condition: Condition::All(vec![
                    Condition::Seen("scene2:minefield_cleared".into()),
                    Condition::Not(Box::new(Condition::Seen("scene2:mine_detonated".into()))),
                ]),
            },
            CatalogEntry {
                id: "by-the-book".into(),
                title: "By The Book".into(),
                description: "Pass the exam before braving the minefield".into(),
                hidden: false,
                condition: Condition::SeenInOrder(vec![
                    "scene1:exam_finished".into(),
                    "scene2:minefield_cleared".into(),
                ]),
            },
            CatalogEntry {
                id: "persistent".into(),
                title: "If At First...".into(),
                description: "Retry the sliding puzzle five times".into(),
                hidden: false,
                condition: Condition::SeenAtLeast {
                    name: "scene3:puzzle_retry".into(),
                    count: 5,
                },
            },
            CatalogEntry {
                id: "slider".into(),
                title: "Tile Wrangler".into(),
                description: "Solve the sliding puzzle".into(),
                hidden: false,
                condition: Condition::Seen("scene3:slider_solved".into()),
            },
            CatalogEntry {
                id: "historian".into(),
                title: "Historian".into(),
                description: "Put the timeline in order".into(),
                hidden: false,
                condition: Condition::Seen("scene4:timeline_sorted".into()),
            },
            CatalogEntry {
                id: "speedrun".into(),
                title: "No Time To Waste".into(),
                description: "Reach the finale within two minutes of registering".into(),
                hidden: false,
                condition: Condition::WithinOfRegistration {
                    name: "scene5:finale_reached".into(),
                    within_ms: 120_000,
                },
            },
            CatalogEntry {
                id: "completionist".into(),
                title: "The Whole Story".into(),
                description: "See every scene through".into(),
                hidden: false,
                condition: Condition::All(vec![
                    Condition::Seen("scene1:exam_finished".into()),
                    Condition::Seen("scene2:minefield_cleared".into()),
                    Condition::Seen("scene3:slider_solved".into()),
                    Condition::Seen("scene4:timeline_sorted".into()),
                    Condition::Seen("scene5:finale_reached".into()),
                ]),
            },
            CatalogEntry {
                id: "snooper".into(),
                title: "Snooper".into(),
                description: "Poke around where you should not".into(),
                hidden: true,
                condition: Condition::FieldEquals {
                    name: "debug:panel_opened".into(),
                    field: "deliberate".into(),
                    value: FieldValue::Bool(true),
                },
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn export_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.ron");

        export_default(&path).unwrap();
        assert!(path.exists());

        let loaded = load_or_default(&path);
        assert_eq!(loaded.len(), default_catalog().len());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let catalog = load_or_default(dir.path().join("nowhere.ron"));
        assert_eq!(catalog.len(), default_catalog().len());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.ron");
        fs::write(&path, "(((this is not ron").unwrap();

        let catalog = load_or_default(&path);
        assert_eq!(catalog.len(), default_catalog().len());
    }

    #[test]
    fn default_catalog_ids_are_unique_and_non_empty() {
        let catalog = default_catalog();
        let mut ids: Vec<&str> = catalog.entries.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.iter().all(|id| !id.is_empty()));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }
}
