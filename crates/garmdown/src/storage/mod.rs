//! Storage layer for activity sync state
//!
//! A single SQLite file records every activity seen on Garmin Connect along
//! with when its TCX file was downloaded and when it was handed to the
//! importer, plus a log of database backups.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/garmdown/
//! ├── activities.sqlite3           # activities + backups
//! ├── tcx/                         # downloaded track files
//! │   └── 2024-03-01_12345.tcx
//! ├── import/                      # copies waiting for the importer
//! └── backup/
//!     └── activities.sqlite3-2024-03-01_07-00
//! ```

mod activity_store;
mod schema;

pub use activity_store::{ActivityStore, StoreSummary};

use std::path::PathBuf;

/// Get the default storage path
pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("garmdown")
}

/// Get the default activity database path
pub fn default_db_path() -> PathBuf {
    default_storage_path().join("activities.sqlite3")
}
