//! Best-effort artwork resolution through the public lookup endpoint.
//!
//! Identifiers are looked up in batches; a failed batch is logged and
//! skipped, so a missing key in the result only ever means "no artwork".

mod client;

pub use client::ItunesLookupClient;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::config::LookupConfig;
use crate::error::Result;

/// One result of the lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub track_id: i64,
    #[serde(default)]
    pub artwork_url60: Option<String>,
    #[serde(default)]
    pub artwork_url100: Option<String>,
    #[serde(default)]
    pub artwork_url512: Option<String>,
}

impl LookupResult {
    /// Highest resolution artwork that parses as a URL.
    pub fn best_artwork(&self) -> Option<Url> {
        [&self.artwork_url512, &self.artwork_url100, &self.artwork_url60]
            .into_iter()
            .flatten()
            .find_map(|raw| Url::parse(raw).ok())
    }
}

/// Body returned by the lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub results: Vec<LookupResult>,
}

/// Transport for a single batched lookup.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    async fn fetch(&self, track_ids: &[i64]) -> Result<LookupResponse>;
}

/// Batches identifiers and resolves their artwork.
#[derive(Clone)]
pub struct ArtworkLookupService {
    transport: Arc<dyn LookupTransport>,
    batch_size: usize,
}

impl ArtworkLookupService {
    pub fn new(transport: Arc<dyn LookupTransport>) -> Self {
        Self {
            transport,
            batch_size: LookupConfig::BATCH_SIZE,
        }
    }

    /// Service backed by the public endpoint.
    pub fn public() -> Result<Self> {
        Ok(Self::new(Arc::new(ItunesLookupClient::new()?)))
    }

    /// Map each identifier found by the endpoint to its artwork.
    pub async fn lookup(&self, track_ids: impl IntoIterator<Item = i64>) -> HashMap<i64, Url> {
        let unique: Vec<i64> = track_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut artwork = HashMap::new();
        for chunk in unique.chunks(self.batch_size) {
            match self.transport.fetch(chunk).await {
                Ok(response) => {
                    for result in response.results {
                        if let Some(url) = result.best_artwork() {
                            artwork.insert(result.track_id, url);
                        }
                    }
                }
                Err(e) => {
                    warn!("Artwork lookup for {} ids failed: {}", chunk.len(), e);
                }
            }
        }

        debug!("Resolved artwork for {}/{} ids", artwork.len(), unique.len());
        artwork
    }
}
