//! Garmin Connect API client for authenticated requests
//!
//! Blocking client for the two endpoints the sync needs: the activity list
//! and the TCX export.

use std::io::Read;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::{AccessToken, ActivitySource};
use crate::error::{GarmdownError, Result};

/// User agent for Connect API requests
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Garmin Connect API client
pub struct ConnectClient {
    client: Client,
    base_url: String,
    token: AccessToken,
}

impl ConnectClient {
    /// Create a client for the given base URL, e.g. `https://connectapi.garmin.com`
    pub fn new(base_url: &str, token: AccessToken) -> Result<Self> {
        let client = Client::builder().build().map_err(GarmdownError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build the full URL for a given path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with authorization
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let auth = HeaderValue::from_str(&self.token.authorization_header())
            .map_err(|e| GarmdownError::config(format!("Invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the response
    pub fn get(&self, path: &str) -> Result<Response> {
        let url = self.build_url(path);
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .map_err(GarmdownError::Http)?;

        handle_response_status(response, "connect")
    }

    /// Make an authenticated GET request and deserialize JSON response
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path)?;
        response.json().map_err(|e| {
            GarmdownError::invalid_response(format!("Failed to parse JSON response: {}", e))
        })
    }
}

impl ActivitySource for ConnectClient {
    fn list_activities(&self, offset: u32, count: u32) -> Result<Vec<serde_json::Value>> {
        let path = format!(
            "/activitylist-service/activities/search/activities?limit={}&start={}",
            count, offset
        );
        self.get_json(&path)
    }

    fn stream_track_file(&self, activity_id: &str) -> Result<Box<dyn Read + '_>> {
        let path = format!("/download-service/export/tcx/activity/{}", activity_id);
        let response = self.get(&path)?;
        Ok(Box::new(response))
    }
}

/// Handle response status codes and convert to errors
pub(crate) fn handle_response_status(response: Response, service: &str) -> Result<Response> {
    let status = response.status();

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
            Ok(response)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(GarmdownError::NotAuthenticated(service.to_string()))
        }
        StatusCode::NOT_FOUND => Err(GarmdownError::NotFound(response.url().path().to_string())),
        _ => {
            let body = response.text().unwrap_or_default();
            Err(GarmdownError::invalid_response(format!(
                "API error {}: {}",
                status, body
            )))
        }
    }
}
