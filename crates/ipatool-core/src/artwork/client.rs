//! HTTP transport for the public lookup endpoint.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{LookupResponse, LookupTransport};
use crate::config::LookupConfig;
use crate::error::{IpatoolError, Result};

/// Lookup transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ItunesLookupClient {
    client: Client,
    endpoint: String,
}

impl ItunesLookupClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(LookupConfig::ENDPOINT)
    }

    /// Client for a different lookup endpoint, e.g. a regional mirror.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(LookupConfig::REQUEST_TIMEOUT)
            .user_agent(LookupConfig::USER_AGENT)
            .build()
            .map_err(|e| IpatoolError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Request URL for a batch of identifiers.
    pub fn batch_url(&self, track_ids: &[i64]) -> String {
        let ids = track_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}?id={}", self.endpoint, ids)
    }
}

#[async_trait]
impl LookupTransport for ItunesLookupClient {
    async fn fetch(&self, track_ids: &[i64]) -> Result<LookupResponse> {
        let url = self.batch_url(track_ids);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IpatoolError::Network {
                message: format!("GET {} failed: {}", url, e),
                source: Some(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IpatoolError::Network {
                message: format!("GET {} returned {}", url, status),
                source: None,
            });
        }

        // The endpoint answers with a text/javascript content type, so parse
        // the body ourselves instead of relying on `Response::json`.
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
