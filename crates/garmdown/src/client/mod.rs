//! Remote collaborators: the activity source and the training spreadsheet
//!
//! The sync and sheet code only see the [`ActivitySource`] and
//! [`SheetClient`] traits. How a session is authenticated is up to the
//! implementation; the shipped clients send a pre-obtained bearer token.

pub mod api;
pub mod sheets;
pub mod tokens;

use std::io::Read;

pub use api::ConnectClient;
pub use sheets::SheetsClient;
pub use tokens::AccessToken;

use crate::error::Result;

/// Source of activity metadata and TCX track files
pub trait ActivitySource {
    /// Raw activity records starting at the 0-based `offset`
    fn list_activities(&self, offset: u32, count: u32) -> Result<Vec<serde_json::Value>>;

    /// Byte stream of the TCX file for an activity
    fn stream_track_file(&self, activity_id: &str) -> Result<Box<dyn Read + '_>>;
}

/// Cell range access to a spreadsheet, addressed as `Sheet!A1:B2`
pub trait SheetClient {
    /// Rows of cells; trailing empty rows and cells are omitted
    fn read(&self, range: &str) -> Result<Vec<Vec<String>>>;

    fn write(&self, range: &str, rows: &[Vec<String>]) -> Result<()>;
}
