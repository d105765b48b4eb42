//! Production [`RemoteClient`] backed by a blocking HTTP client.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::auth::AuthConfig;
use super::{RemoteClient, RemoteError};

const DEFAULT_BASE_URL: &str = "https://slack.com";

/// JSON-over-HTTP client for the platform's `api/<method>` endpoints.
pub struct HttpRemoteClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl HttpRemoteClient {
    pub fn new(auth: &AuthConfig) -> Result<Self> {
        Self::with_base_url(auth, DEFAULT_BASE_URL)
    }

    /// Build a client against an explicit API base URL (used by tests and
    /// alternate deployments).
    pub fn with_base_url(auth: &AuthConfig, base_url: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: auth.access_token.clone(),
        })
    }
}

impl RemoteClient for HttpRemoteClient {
    fn call_method(&self, method: &str, payload: Value) -> Result<Value, RemoteError> {
        let url = format!("{}/api/{}", self.base_url, method);
        debug!(method, "calling remote");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited {
                wait: Duration::from_secs(wait),
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            let warnings = body
                .get("response_metadata")
                .and_then(|m| m.get("warnings"))
                .and_then(Value::as_array)
                .map(|w| {
                    w.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return Err(RemoteError::Api { code, warnings });
        }
        Ok(body)
    }
}
