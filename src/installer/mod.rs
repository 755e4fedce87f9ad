//! Dataset installation from the bundled archive
//!
//! Compares the bundled dataset version against the installed copy and, on
//! mismatch, replaces the installed directory wholesale: wipe, recreate,
//! extract the archive, then copy the metadata file last. Because the
//! metadata lands only after extraction succeeds, a crash mid-install leaves
//! a directory that the next run's version check treats as "not installed"
//! and wipes again. There is no rollback and no in-call retry.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bundle::{BundleSource, DbMetadata, INSTALL_DIR_NAME, METADATA_NAME};

/// Installation errors
///
/// Every variant is terminal for the call that raised it; recovery is the
/// clean wipe performed by the next installation attempt.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The bundled archive or metadata could not be found
    #[error("Bundled dataset resource is missing: {path}")]
    BundledResourceMissing { path: PathBuf },

    /// The previous installation could not be removed
    #[error("Failed to remove old dataset at {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target directory could not be created
    #[error("Failed to create dataset directory at {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundled archive could not be extracted
    #[error("Failed to extract dataset archive {archive}")]
    ExtractFailed {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundled metadata could not be copied into place
    #[error("Failed to copy dataset metadata to {path}")]
    MetadataCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Installer for the bundled puzzle dataset
pub struct Installer {
    bundle: BundleSource,
    target_dir: PathBuf,
}

impl Installer {
    /// Create an installer targeting the platform user-data directory
    ///
    /// Returns `None` when no home directory can be determined for the
    /// current user; embedding applications should fall back to
    /// [`Installer::with_target_dir`] with a path of their own.
    pub fn new(bundle: BundleSource) -> Option<Self> {
        let dirs = directories::ProjectDirs::from("org", "lichess", "puzzle-db")?;
        let target_dir = dirs.data_dir().join(INSTALL_DIR_NAME);
        Some(Self::with_target_dir(bundle, target_dir))
    }

    /// Create an installer targeting an explicit directory
    pub fn with_target_dir(bundle: BundleSource, target_dir: PathBuf) -> Self {
        Self { bundle, target_dir }
    }

    /// The directory the dataset is installed into
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Ensure a current dataset is installed
    ///
    /// Returns true when a usable dataset is present after the call, either
    /// because the installed version already matches the bundled one or
    /// because installation just succeeded. Returns false when installation
    /// was required but failed; the failure is logged, never retried here.
    pub fn ensure_installed(&self) -> bool {
        if !self.should_install() {
            debug!("Installed dataset is current, nothing to do");
            return true;
        }

        match self.install() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dataset installation failed: {e:#}");
                false
            }
        }
    }

    /// Whether the bundled and installed versions differ
    ///
    /// Version equality is the sole freshness signal. A missing or unreadable
    /// installed metadata file counts as a mismatch, which is what makes a
    /// half-written directory self-healing: extraction without the trailing
    /// metadata copy never reads as installed.
    pub fn should_install(&self) -> bool {
        let bundled = match self.bundle.metadata() {
            Ok(metadata) => Some(metadata.version),
            Err(e) => {
                // Unrecoverable: the bundle ships with the application
                warn!("Bundled dataset metadata is unreadable: {e:#}");
                None
            }
        };

        let installed = DbMetadata::load_from_path(&self.target_dir.join(METADATA_NAME))
            .ok()
            .map(|metadata| metadata.version);

        bundled != installed
    }

    /// Replace the installed dataset with the bundled one
    ///
    /// Step order is the crash-safety contract: remove, create, extract,
    /// and only then copy the metadata that marks the install complete.
    pub fn install(&self) -> Result<(), InstallError> {
        if !self.bundle.archive.exists() {
            return Err(InstallError::BundledResourceMissing {
                path: self.bundle.archive.clone(),
            });
        }
        if !self.bundle.metadata.exists() {
            return Err(InstallError::BundledResourceMissing {
                path: self.bundle.metadata.clone(),
            });
        }

        info!(
            "Installing puzzle dataset into {}",
            self.target_dir.display()
        );

        if self.target_dir.exists() {
            std::fs::remove_dir_all(&self.target_dir).map_err(|source| {
                InstallError::RemoveFailed {
                    path: self.target_dir.clone(),
                    source,
                }
            })?;
        }

        std::fs::create_dir_all(&self.target_dir).map_err(|source| {
            InstallError::CreateDirFailed {
                path: self.target_dir.clone(),
                source,
            }
        })?;

        self.extract_archive()?;

        let metadata_target = self.target_dir.join(METADATA_NAME);
        std::fs::copy(&self.bundle.metadata, &metadata_target).map_err(|source| {
            InstallError::MetadataCopyFailed {
                path: metadata_target,
                source,
            }
        })?;

        info!("Puzzle dataset installed");
        Ok(())
    }

    /// Unpack the bundled archive into the target directory
    fn extract_archive(&self) -> Result<(), InstallError> {
        let extract_failed = |source| InstallError::ExtractFailed {
            archive: self.bundle.archive.clone(),
            source,
        };

        let file = File::open(&self.bundle.archive).map_err(extract_failed)?;
        let gz_decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(gz_decoder);

        archive.unpack(&self.target_dir).map_err(extract_failed)?;

        Ok(())
    }
}
