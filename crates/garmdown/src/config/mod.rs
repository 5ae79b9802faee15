//! Configuration and credentials
//!
//! The config file lives under the platform config directory and tokens
//! under the platform data directory, each in a `garmdown` subdirectory.

mod credentials;
mod settings;

pub use credentials::{CredentialStore, TokenKind};
pub use settings::{
    BackupConfig, ColumnTarget, Config, ConnectConfig, DownloadConfig, SheetConfig, StoreConfig,
};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{GarmdownError, Result};

const APP_DIR: &str = "garmdown";

fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    base.map(|p| p.join(APP_DIR))
        .ok_or_else(|| GarmdownError::config(format!("Could not determine the {} directory", kind)))
}

/// `~/.config/garmdown` on Linux
pub fn config_dir() -> Result<PathBuf> {
    app_dir(dirs::config_dir(), "config")
}

/// `~/.local/share/garmdown` on Linux; holds the per-profile token files
pub fn data_dir() -> Result<PathBuf> {
    app_dir(dirs::data_dir(), "data")
}

/// Create a directory and its parents. Errors name the directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        GarmdownError::Io(io::Error::new(
            e.kind(),
            format!("cannot create {}: {}", path.display(), e),
        ))
    })
}

/// Expand a leading `~` component to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir()
        .map(|home| home.join(rest))
        .unwrap_or_else(|| path.to_path_buf())
}
