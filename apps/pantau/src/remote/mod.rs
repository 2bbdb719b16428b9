//! # Remote Record Store Client
//!
//! Thin wrapper around the record store's REST API.
//!
//! ## Endpoints consumed
//!
//! - `GET {base}/proposals` → proposal records
//! - `GET {base}/statistics/summary` → pre-aggregated summary
//! - `GET {base}/desa` → regional roster
//!
//! Responses are parsed leniently by [`wire`]; the client itself only maps
//! transport and status failures onto [`FetchError`].

pub mod wire;

use crate::cache::{Fetcher, RosterSource};
use async_trait::async_trait;
use pantau_core::{Desa, ProposalDataset, StatisticsSummary};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors from the remote client layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,
    /// Cannot reach the record store.
    #[error("Cannot connect to record store at {0}")]
    ConnectionFailed(String),
    /// 401 Unauthorized - invalid or missing API key.
    #[error("Unauthorized: invalid or missing API key")]
    Unauthorized,
    /// 429 Too Many Requests.
    #[error("Rate limited: too many requests")]
    RateLimited,
    /// Record store returned an error status.
    #[error("Server error ({0}): {1}")]
    Server(u16, String),
    /// Failed to parse the response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether this failure is a timeout (served from cache when possible).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

/// HTTP client for the remote record store.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteClient {
    /// Create a client. `timeout` bounds every request end to end.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a GET request with optional Bearer auth.
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.get(&url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Send a request, check the status and parse JSON.
    async fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
        let resp = self.get(path).send().await.map_err(|e| self.transport_error(&e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server(status.as_u16(), body));
        }

        resp.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Parse(e.to_string())
            }
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::ConnectionFailed(format!("{}: {e}", self.base_url))
        }
    }

    /// GET /proposals
    pub async fn proposals(&self) -> Result<ProposalDataset, FetchError> {
        let value = self.fetch_json("/proposals").await?;
        wire::parse_proposals(&value).map(ProposalDataset::new)
    }

    /// GET /statistics/summary
    pub async fn summary(&self) -> Result<StatisticsSummary, FetchError> {
        let value = self.fetch_json("/statistics/summary").await?;
        wire::parse_summary(&value)
    }

    /// GET /desa
    pub async fn roster(&self) -> Result<Vec<Desa>, FetchError> {
        let value = self.fetch_json("/desa").await?;
        wire::parse_roster(&value)
    }
}

#[async_trait]
impl Fetcher<ProposalDataset> for RemoteClient {
    async fn fetch(&self) -> Result<ProposalDataset, FetchError> {
        self.proposals().await
    }
}

#[async_trait]
impl Fetcher<StatisticsSummary> for RemoteClient {
    async fn fetch(&self) -> Result<StatisticsSummary, FetchError> {
        self.summary().await
    }
}

#[async_trait]
impl RosterSource for RemoteClient {
    async fn load(&self) -> Result<Vec<Desa>, FetchError> {
        self.roster().await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = RemoteClient::new("http://localhost:9000/api/", None, Duration::from_secs(1))
            .expect("client");
        assert_eq!(client.base_url(), "http://localhost:9000/api");
    }

    #[test]
    fn only_timeout_is_timeout() {
        assert!(FetchError::Timeout.is_timeout());
        assert!(!FetchError::RateLimited.is_timeout());
        assert!(!FetchError::Server(500, String::new()).is_timeout());
    }

    #[tokio::test]
    async fn unreachable_store_is_connection_failure() {
        let client = RemoteClient::new("http://127.0.0.1:9", None, Duration::from_secs(2))
            .expect("client");
        let err = client.summary().await.expect_err("nothing listens on port 9");
        assert!(matches!(
            err,
            FetchError::ConnectionFailed(_) | FetchError::Timeout
        ));
    }
}
