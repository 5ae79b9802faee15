//! Token commands for garmdown
//!
//! Tokens are obtained outside garmdown (browser session, OAuth playground,
//! service account tooling) and stored per profile.

use std::io::{self, Write};

use chrono::Utc;

use crate::cli::AppContext;
use crate::client::AccessToken;
use crate::config::TokenKind;
use crate::error::{GarmdownError, Result};

const SERVICES: [TokenKind; 2] = [TokenKind::Connect, TokenKind::Sheets];

/// Store a bearer token for a service, prompting for it when not given
pub fn set(
    ctx: &AppContext,
    service: TokenKind,
    token: Option<String>,
    expires_in: Option<i64>,
) -> Result<()> {
    let store = ctx.credentials()?;

    let value = match token {
        Some(t) => t,
        None => token_prompt(&format!("{} token: ", service.name()))?,
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(GarmdownError::config("token must not be empty"));
    }

    let mut token = AccessToken::new(value);
    if let Some(seconds) = expires_in {
        token = token.expiring_in(seconds);
    }
    store.save(service, &token)?;

    println!("Stored {} token.", service.name());
    println!("Profile: {}", store.profile());
    Ok(())
}

/// Remove a stored token
pub fn clear(ctx: &AppContext, service: TokenKind) -> Result<()> {
    let store = ctx.credentials()?;
    store.clear(service)?;
    println!("Removed {} token.", service.name());
    Ok(())
}

/// Show which tokens are stored and whether they are still valid
pub fn status(ctx: &AppContext) -> Result<()> {
    let store = ctx.credentials()?;
    println!("Profile: {}", store.profile());

    for service in SERVICES {
        let overridden = std::env::var(service.env_var()).is_ok_and(|v| !v.is_empty());
        let state = if overridden {
            format!("from {}", service.env_var())
        } else {
            match store.load(service)? {
                None => "not set".to_string(),
                Some(token) => describe_expiry(&token),
            }
        };
        println!("  {:<8} {}", service.name(), state);
    }
    Ok(())
}

fn describe_expiry(token: &AccessToken) -> String {
    if token.is_expired() {
        return "expired".to_string();
    }
    match token.expires_at {
        None => "valid (no expiry recorded)".to_string(),
        Some(at) => {
            let expires_in = at - Utc::now().timestamp();
            if expires_in > 3600 {
                format!("valid (expires in {} hours)", expires_in / 3600)
            } else if expires_in > 60 {
                format!("valid (expires in {} minutes)", expires_in / 60)
            } else {
                format!("valid (expires in {} seconds)", expires_in)
            }
        }
    }
}

/// Prompt for a token without echoing
fn token_prompt(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    Ok(rpassword::read_password()?)
}
