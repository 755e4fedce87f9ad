//! Record store - the installed dataset loaded into memory
//!
//! The installed directory holds a single bincode record file. Loading it
//! builds an arena of puzzle records plus a theme adjacency index keyed by
//! arena offsets, which is the explicit form of the puzzle/theme many-to-many
//! relation. The store is read-only between installs; the only mutation it
//! ever sees is whole-dataset replacement by the installer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::bundle::RECORDS_NAME;

/// Store access errors
#[derive(Error, Debug)]
pub enum StoreAccessError {
    /// The record file could not be read
    #[error("Failed to read record file: {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record file decoded into an invalid model
    #[error("Corrupt puzzle dataset: {reason}")]
    CorruptModel { reason: String },
}

/// Store-native puzzle row, as serialized in the record file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    /// Lichess puzzle id, stable across database updates
    pub id: String,
    /// FEN of the starting position, stored opaquely
    pub fen: String,
    /// Solution moves in UCI format, never empty
    pub moves: Vec<String>,
    /// Estimated difficulty rating
    pub rating: i32,
    /// Rating deviation of the estimate
    pub rating_deviation: i32,
    /// Popularity score from player feedback
    pub popularity: i32,
    /// Theme tags categorizing the puzzle
    pub themes: Vec<String>,
}

/// A puzzle as returned to callers
///
/// The puzzle should be presented to the user by playing the first move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    /// Lichess puzzle id, usable to refer to a puzzle across updates
    pub id: String,
    /// FEN of the starting position
    pub fen: String,
    /// Solution moves in UCI format
    pub moves: Vec<String>,
    /// Estimated difficulty rating
    pub rating: i32,
    /// Rating deviation of the estimate
    pub rating_deviation: i32,
    /// Popularity score
    pub popularity: i32,
    /// Theme tags
    pub themes: HashSet<String>,
}

impl From<&PuzzleRecord> for Puzzle {
    fn from(record: &PuzzleRecord) -> Self {
        Self {
            id: record.id.clone(),
            fen: record.fen.clone(),
            moves: record.moves.clone(),
            rating: record.rating,
            rating_deviation: record.rating_deviation,
            popularity: record.popularity,
            themes: record.themes.iter().cloned().collect(),
        }
    }
}

/// The loaded dataset: record arena plus theme adjacency index
#[derive(Debug)]
pub struct Dataset {
    /// All puzzle records, in record-file order
    records: Vec<PuzzleRecord>,
    /// Theme name -> offsets into `records` of every puzzle tagged with it
    theme_index: HashMap<String, Vec<u32>>,
}

impl Dataset {
    /// Load the dataset from an installed directory
    ///
    /// Decodes the record file and rebuilds the theme index. Fails closed on
    /// any record violating the model: duplicate ids or empty move lists.
    pub fn load(dir: &Path) -> Result<Self, StoreAccessError> {
        let path = dir.join(RECORDS_NAME);
        debug!("Loading puzzle dataset from {}", path.display());

        let bytes = std::fs::read(&path).map_err(|source| StoreAccessError::ReadFailed {
            path: path.clone(),
            source,
        })?;

        let records: Vec<PuzzleRecord> =
            bincode::deserialize(&bytes).map_err(|e| StoreAccessError::CorruptModel {
                reason: format!("record file failed to decode: {e}"),
            })?;

        Self::from_records(records)
    }

    /// Build a dataset directly from records, enforcing model invariants
    pub fn from_records(records: Vec<PuzzleRecord>) -> Result<Self, StoreAccessError> {
        let mut seen_ids = HashSet::with_capacity(records.len());
        let mut theme_index: HashMap<String, Vec<u32>> = HashMap::new();

        for (offset, record) in records.iter().enumerate() {
            if !seen_ids.insert(record.id.as_str()) {
                return Err(StoreAccessError::CorruptModel {
                    reason: format!("duplicate puzzle id: {}", record.id),
                });
            }
            if record.moves.is_empty() {
                return Err(StoreAccessError::CorruptModel {
                    reason: format!("puzzle {} has no moves", record.id),
                });
            }
            for theme in &record.themes {
                let members = theme_index.entry(theme.clone()).or_default();
                // Duplicate tags on one record collapse to a single edge
                if members.last() != Some(&(offset as u32)) {
                    members.push(offset as u32);
                }
            }
        }

        info!(
            "Loaded {} puzzles across {} themes",
            records.len(),
            theme_index.len()
        );

        Ok(Self {
            records,
            theme_index,
        })
    }

    /// All records, in store-native order
    pub fn records(&self) -> &[PuzzleRecord] {
        &self.records
    }

    /// Number of puzzles in the dataset
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset holds no puzzles
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The distinct theme catalog, in unspecified order
    pub fn themes(&self) -> Vec<String> {
        self.theme_index.keys().cloned().collect()
    }

    /// Arena offsets of every puzzle tagged with `theme`
    pub fn theme_members(&self, theme: &str) -> Option<&[u32]> {
        self.theme_index.get(theme).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, themes: &[&str]) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
            moves: vec!["a2a3".to_string()],
            rating: 1200,
            rating_deviation: 75,
            popularity: 90,
            themes: themes.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_theme_index_is_symmetric() {
        let dataset = Dataset::from_records(vec![
            record("a", &["fork", "endgame"]),
            record("b", &["fork"]),
            record("c", &[]),
        ])
        .unwrap();

        // Every record referencing a theme appears in that theme's member set
        for (offset, rec) in dataset.records().iter().enumerate() {
            for theme in &rec.themes {
                let members = dataset.theme_members(theme).unwrap();
                assert!(members.contains(&(offset as u32)));
            }
        }

        // And conversely
        for theme in dataset.themes() {
            for &offset in dataset.theme_members(&theme).unwrap() {
                assert!(dataset.records()[offset as usize]
                    .themes
                    .contains(&theme));
            }
        }

        assert_eq!(dataset.themes().len(), 2);
    }

    #[test]
    fn test_duplicate_id_is_corrupt() {
        let result = Dataset::from_records(vec![record("same", &[]), record("same", &[])]);
        assert!(matches!(
            result,
            Err(StoreAccessError::CorruptModel { .. })
        ));
    }

    #[test]
    fn test_empty_moves_is_corrupt() {
        let mut bad = record("x", &[]);
        bad.moves.clear();

        let result = Dataset::from_records(vec![bad]);
        assert!(matches!(
            result,
            Err(StoreAccessError::CorruptModel { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_read_failed() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = Dataset::load(temp_dir.path());
        assert!(matches!(result, Err(StoreAccessError::ReadFailed { .. })));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(RECORDS_NAME), b"not bincode").unwrap();

        let result = Dataset::load(temp_dir.path());
        assert!(matches!(
            result,
            Err(StoreAccessError::CorruptModel { .. })
        ));
    }

    #[test]
    fn test_puzzle_value_mapping() {
        let dataset = Dataset::from_records(vec![record("a", &["fork", "fork"])]).unwrap();
        let puzzle = Puzzle::from(&dataset.records()[0]);

        // Set semantics collapse duplicate tags
        assert_eq!(puzzle.themes.len(), 1);
        assert!(puzzle.themes.contains("fork"));
        assert_eq!(puzzle.moves, vec!["a2a3".to_string()]);
    }
}
