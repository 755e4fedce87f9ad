//! Lichess puzzle database library exports
//!
//! A versioned, read-only puzzle catalog shipped with the host application.
//! [`catalog::PuzzleDb`] is the entry point: it installs or refreshes the
//! bundled dataset on open and answers filtered, sorted, paginated queries.

pub mod bundle;
pub mod catalog;
pub mod installer;
pub mod query;
pub mod store;

pub use bundle::{BundleSource, DbMetadata};
pub use catalog::{PuzzleDb, QueryError};
pub use installer::{InstallError, Installer};
pub use query::{PuzzleQuery, SortKey, ThemeFilter};
pub use store::{Dataset, Puzzle, PuzzleRecord, StoreAccessError};
