use std::path::PathBuf;

use chrono::NaiveDate;

use crate::client::{ConnectClient, SheetsClient};
use crate::config::{Config, CredentialStore, TokenKind};
use crate::error::{GarmdownError, Result};
use crate::models::activity::DATE_FORMAT;
use crate::storage::ActivityStore;

/// Loaded configuration plus the selected profile, shared by every command.
/// Remote clients are built on demand so local-only commands never need a token.
pub struct AppContext {
    pub config: Config,
    pub profile: Option<String>,
}

impl AppContext {
    pub fn new(config: Config, profile: Option<String>) -> Self {
        Self { config, profile }
    }

    /// Load the config from an explicit path, `GARMDOWN_CONFIG`, or the default location
    pub fn load(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Self> {
        let path = Config::resolve_path(config_path)?;
        tracing::debug!(path = %path.display(), "loading config");
        Ok(Self::new(Config::load(&path)?, profile))
    }

    pub fn store(&self) -> Result<ActivityStore> {
        Ok(ActivityStore::new(
            self.config.store.db_file.clone(),
            self.config.activity_factory()?,
            self.config.download.tcx_chunk_size,
        ))
    }

    pub fn credentials(&self) -> Result<CredentialStore> {
        CredentialStore::new(self.profile.clone())
    }

    pub fn connect_client(&self) -> Result<ConnectClient> {
        let token = self.credentials()?.require(TokenKind::Connect)?;
        ConnectClient::new(&self.config.connect.base_url, token)
    }

    pub fn sheets_client(&self) -> Result<SheetsClient> {
        let sheet = &self.config.sheet;
        let sheet_id = sheet
            .sheet_id
            .as_deref()
            .ok_or_else(|| GarmdownError::config("sheet.sheet_id is not set"))?;
        let token = self.credentials()?.require(TokenKind::Sheets)?;
        SheetsClient::new(&sheet.base_url, sheet_id, token)
    }
}

/// Parse a `YYYY-MM-DD` command line date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| GarmdownError::InvalidDateFormat(s.to_string()))
}
