//! Google Sheets values API client
//!
//! Reads and writes cell ranges of one spreadsheet. Values are written with
//! `USER_ENTERED` so numbers typed as text are parsed by Sheets.

use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::api::handle_response_status;
use super::{AccessToken, SheetClient};
use crate::error::{GarmdownError, Result};

/// Body of a values read or write
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Client for a single spreadsheet
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    sheet_id: String,
    token: AccessToken,
}

impl SheetsClient {
    pub fn new(base_url: &str, sheet_id: impl Into<String>, token: AccessToken) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GarmdownError::config(format!("Invalid sheet.base_url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GarmdownError::config(format!(
                "sheet.base_url '{}' cannot be a base URL",
                base_url
            )));
        }
        let client = Client::builder().build().map_err(GarmdownError::Http)?;
        Ok(Self {
            client,
            base_url,
            sheet_id: sheet_id.into(),
            token,
        })
    }

    /// URL of the values resource for a range; the range is one encoded path segment
    fn values_url(&self, range: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets", self.sheet_id.as_str(), "values", range]);
        }
        url
    }
}

impl SheetClient for SheetsClient {
    fn read(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range);
        tracing::debug!(%url, "reading sheet range");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.token.authorization_header())
            .send()
            .map_err(GarmdownError::Http)?;
        let body: ValueRange = handle_response_status(response, "sheets")?
            .json()
            .map_err(|e| {
                GarmdownError::invalid_response(format!("Failed to parse sheet values: {}", e))
            })?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn write(&self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url(range);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        tracing::debug!(%url, rows = rows.len(), "writing sheet range");

        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: rows
                .iter()
                .map(|row| row.iter().cloned().map(Value::String).collect())
                .collect(),
        };
        let response = self
            .client
            .put(url)
            .header(AUTHORIZATION, self.token.authorization_header())
            .json(&body)
            .send()
            .map_err(GarmdownError::Http)?;
        handle_response_status(response, "sheets")?;
        Ok(())
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
