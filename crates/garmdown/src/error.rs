use std::path::PathBuf;

use thiserror::Error;

/// Main error type for garmdown
#[derive(Error, Debug)]
pub enum GarmdownError {
    #[error("Authentication required: no valid {0} token. Store one with 'garmdown token'.")]
    NotAuthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Unknown activity type code '{0}'")]
    UnknownActivityType(String),

    #[error("Downloaded file {} has size {size} < {min}", .path.display())]
    UndersizedDownload { path: PathBuf, size: u64, min: u64 },

    #[error("Track file {} is marked downloaded but missing on disk", .0.display())]
    MissingTrackFile(PathBuf),

    #[error("Invalid spreadsheet data: {0}")]
    InvalidSheet(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),
}

pub type Result<T> = std::result::Result<T, GarmdownError>;

impl GarmdownError {
    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid response error from a message
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid activity payload error from a message
    pub fn invalid_activity(msg: impl Into<String>) -> Self {
        Self::InvalidActivity(msg.into())
    }

    /// Create an invalid spreadsheet data error from a message
    pub fn invalid_sheet(msg: impl Into<String>) -> Self {
        Self::InvalidSheet(msg.into())
    }

    /// Wrap a database error with what was being attempted
    pub fn database(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Database(format!("{}: {}", context, err))
    }
}
