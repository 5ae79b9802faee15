use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Bearer token for API requests.
/// Obtained outside garmdown and stored with `garmdown token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    /// Unix timestamp after which the token is rejected; `None` if unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token_type: default_token_type(),
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    /// Set the expiry relative to now
    pub fn expiring_in(mut self, seconds: i64) -> Self {
        self.expires_at = Some(Utc::now().timestamp() + seconds);
        self
    }

    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at < Utc::now().timestamp(),
            None => false,
        }
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header() {
        let token = AccessToken::new("abc123");
        assert_eq!(token.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn test_expiry() {
        assert!(!AccessToken::new("a").is_expired());
        assert!(!AccessToken::new("a").expiring_in(3600).is_expired());
        assert!(AccessToken::new("a").expiring_in(-10).is_expired());
    }

    #[test]
    fn test_deserialize_without_type() {
        let token: AccessToken = serde_json::from_str(r#"{"access_token":"xyz"}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, None);
    }
}
