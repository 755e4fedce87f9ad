//! Bundled dataset artifact - layout, metadata, and packing
//!
//! The host application ships the puzzle database as two files in a resource
//! directory: a gzipped tar archive holding the record file, and a sibling
//! `meta.json` carrying the dataset version. The same two names reappear in
//! the installed layout under the user data root.
//!
//! # Layout
//!
//! ```text
//! <bundle dir>/                      <data root>/Lichess/
//!     PuzzleDatabase.tar.gz    ==>       puzzles.bin   (extracted)
//!     meta.json                ==>       meta.json     (copied last)
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::PuzzleRecord;

/// Archive file name inside a bundle directory
pub const ARCHIVE_NAME: &str = "PuzzleDatabase.tar.gz";

/// Metadata file name, identical in the bundle and the installed directory
pub const METADATA_NAME: &str = "meta.json";

/// Record file name inside the archive (and the installed directory)
pub const RECORDS_NAME: &str = "puzzles.bin";

/// Subdirectory of the platform data root holding the installed dataset
pub const INSTALL_DIR_NAME: &str = "Lichess";

/// Version metadata shipped with the dataset (meta.json)
///
/// `version` is an opaque token compared by exact string equality; it is the
/// sole freshness signal for the installer. `date` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMetadata {
    /// Opaque dataset version token
    pub version: String,
    /// Publication date, not used in the install decision
    pub date: String,
}

impl DbMetadata {
    /// Create metadata stamped with the current date
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            date: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Load metadata from a JSON file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metadata: {}", path.display()))
    }

    /// Save metadata as JSON
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write metadata: {}", path.display()))?;

        Ok(())
    }
}

/// Locator for the bundled dataset shipped with the application
#[derive(Debug, Clone)]
pub struct BundleSource {
    /// Path to the dataset archive
    pub archive: PathBuf,
    /// Path to the bundled metadata file
    pub metadata: PathBuf,
}

impl BundleSource {
    /// Locate a bundle under a resource directory using the standard names
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            archive: dir.join(ARCHIVE_NAME),
            metadata: dir.join(METADATA_NAME),
        }
    }

    /// Read the bundled metadata
    pub fn metadata(&self) -> Result<DbMetadata> {
        DbMetadata::load_from_path(&self.metadata)
    }
}

/// Write a complete bundle directory from a set of records
///
/// Produces `PuzzleDatabase.tar.gz` (containing `puzzles.bin`) and
/// `meta.json` under `dir`. This is the producer-side counterpart of the
/// installer: dataset build pipelines and tests use it to assemble the
/// artifact the application ships.
pub fn write_bundle(dir: &Path, records: &[PuzzleRecord], metadata: &DbMetadata) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create bundle directory: {}", dir.display()))?;

    let encoded = bincode::serialize(records).context("Failed to encode puzzle records")?;

    let archive_path = dir.join(ARCHIVE_NAME);
    let file = File::create(&archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(encoded.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, RECORDS_NAME, encoded.as_slice())
        .context("Failed to append record file to archive")?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .context("Failed to finalize archive")?;

    metadata.save_to_path(&dir.join(METADATA_NAME))?;

    Ok(())
}
