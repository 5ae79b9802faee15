use crate::client::AccessToken;
use crate::error::{GarmdownError, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Services garmdown holds a token for
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenKind {
    /// Garmin Connect API
    Connect,
    /// Google Sheets API
    Sheets,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Connect => "connect",
            TokenKind::Sheets => "sheets",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            TokenKind::Connect => "connect_token.json",
            TokenKind::Sheets => "sheets_token.json",
        }
    }

    /// Env var that overrides the stored token
    pub fn env_var(&self) -> &'static str {
        match self {
            TokenKind::Connect => "GARMDOWN_CONNECT_TOKEN",
            TokenKind::Sheets => "GARMDOWN_SHEETS_TOKEN",
        }
    }
}

/// Manages token storage for the remote services.
/// Tokens live as JSON files in a per-profile data directory.
pub struct CredentialStore {
    profile: String,
    base_dir: PathBuf,
}

impl CredentialStore {
    /// Create a new credential store for the given profile
    pub fn new(profile: Option<String>) -> Result<Self> {
        let profile = profile.unwrap_or_else(|| "default".to_string());
        let base_dir = super::data_dir()?.join(&profile);
        super::ensure_dir(&base_dir)?;

        Ok(Self { profile, base_dir })
    }

    /// Create a credential store with a custom base directory (for testing)
    pub fn with_dir(profile: impl Into<String>, base_dir: PathBuf) -> Result<Self> {
        let profile = profile.into();
        let dir = base_dir.join(&profile);
        super::ensure_dir(&dir)?;

        Ok(Self {
            profile,
            base_dir: dir,
        })
    }

    /// Get the profile name
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Save a token to storage
    pub fn save(&self, kind: TokenKind, token: &AccessToken) -> Result<()> {
        let path = self.base_dir.join(kind.file_name());
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&path, json)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load a token from storage
    pub fn load(&self, kind: TokenKind) -> Result<Option<AccessToken>> {
        let path = self.base_dir.join(kind.file_name());
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let token: AccessToken = serde_json::from_str(&json)?;
        Ok(Some(token))
    }

    /// Token for a service: the env override, else the stored token.
    /// Missing or expired tokens are an authentication error.
    pub fn require(&self, kind: TokenKind) -> Result<AccessToken> {
        if let Ok(value) = env::var(kind.env_var()) {
            if !value.is_empty() {
                return Ok(AccessToken::new(value));
            }
        }

        match self.load(kind)? {
            Some(token) if !token.is_expired() => Ok(token),
            Some(_) => {
                tracing::warn!(service = kind.name(), "stored token has expired");
                Err(GarmdownError::NotAuthenticated(kind.name().to_string()))
            }
            None => Err(GarmdownError::NotAuthenticated(kind.name().to_string())),
        }
    }

    /// Remove a stored token
    pub fn clear(&self, kind: TokenKind) -> Result<()> {
        let path = self.base_dir.join(kind.file_name());
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
