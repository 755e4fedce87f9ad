//! Puzzle catalog facade - the single entry point for callers
//!
//! [`PuzzleDb::open`] runs the installer once, loads the dataset, and hands
//! back a shared handle. All store access is dispatched through one
//! serialized execution context: callers are async and may submit from any
//! number of tasks, but operations run one at a time with no ordering
//! guarantee between concurrent submissions.
//!
//! Failure policy: nothing here is fatal to the hosting process. A failed
//! install or load marks the handle unavailable, and every subsequent query
//! degrades to an empty or zero answer with a logged diagnostic rather than
//! an error the presentation layer would have to unwrap. Recovery is the
//! next process start, which re-evaluates the install decision.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::error;

use crate::bundle::BundleSource;
use crate::installer::Installer;
use crate::query::{self, PuzzleQuery};
use crate::store::{Dataset, Puzzle};

/// Query-boundary errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// No dataset has ever been successfully installed and loaded
    #[error("Puzzle dataset is unavailable; installation failed or never ran")]
    StoreUnavailable,
}

/// State of the shared store handle
enum StoreState {
    /// Dataset installed and loaded
    Ready(Dataset),
    /// Install or load failed; queries answer empty until the next start
    Unavailable,
}

/// Shared handle to the installed puzzle database
pub struct PuzzleDb {
    /// The single serialized execution context for all store access
    state: Mutex<StoreState>,
}

impl PuzzleDb {
    /// Open the database, installing the bundled dataset if it is stale
    ///
    /// The dataset lands in the platform user-data directory. Open never
    /// fails: an install or load problem yields a handle whose queries all
    /// answer empty, matching the degraded-but-alive contract.
    pub async fn open(bundle: BundleSource) -> Self {
        match Installer::new(bundle) {
            Some(installer) => Self::open_with_installer(installer).await,
            None => {
                error!("No user data directory available; puzzle database is unavailable");
                Self {
                    state: Mutex::new(StoreState::Unavailable),
                }
            }
        }
    }

    /// Open the database with an explicit data directory
    pub async fn open_with_data_dir(bundle: BundleSource, data_dir: PathBuf) -> Self {
        Self::open_with_installer(Installer::with_target_dir(bundle, data_dir)).await
    }

    async fn open_with_installer(installer: Installer) -> Self {
        let state = if installer.ensure_installed() {
            match Dataset::load(installer.target_dir()) {
                Ok(dataset) => StoreState::Ready(dataset),
                Err(e) => {
                    error!("Failed to load installed dataset: {e}");
                    StoreState::Unavailable
                }
            }
        } else {
            error!("Dataset installation failed; queries will return empty results");
            StoreState::Unavailable
        };

        Self {
            state: Mutex::new(state),
        }
    }

    /// The full distinct theme catalog, order unspecified
    pub async fn themes(&self) -> Vec<String> {
        match self.with_dataset(|dataset| dataset.themes()).await {
            Ok(themes) => themes,
            Err(e) => {
                error!("Error fetching themes: {e}");
                Vec::new()
            }
        }
    }

    /// Fetch the puzzles matching a query
    ///
    /// Filters, sorts, and pages per the query. On any store-level failure
    /// the call answers an empty page rather than a partial one.
    pub async fn puzzles(&self, query: &PuzzleQuery) -> Vec<Puzzle> {
        match self
            .with_dataset(|dataset| query::execute(dataset, query))
            .await
        {
            Ok(puzzles) => puzzles,
            Err(e) => {
                error!("Error fetching puzzles: {e}");
                Vec::new()
            }
        }
    }

    /// Count the puzzles matching a query's filters
    ///
    /// Sort and window components of the query are ignored.
    pub async fn count(&self, query: &PuzzleQuery) -> usize {
        match self
            .with_dataset(|dataset| query::count(dataset, query))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!("Error counting puzzles: {e}");
                0
            }
        }
    }

    /// Run one operation inside the serialized store context
    async fn with_dataset<T>(
        &self,
        op: impl FnOnce(&Dataset) -> T,
    ) -> Result<T, QueryError> {
        let state = self.state.lock().await;
        match &*state {
            StoreState::Ready(dataset) => Ok(op(dataset)),
            StoreState::Unavailable => Err(QueryError::StoreUnavailable),
        }
    }
}
